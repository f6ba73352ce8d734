//! Serde model of the WAT metadata record payload.
//!
//! Only the portions of the envelope the pipeline reads are modeled; every
//! field is defaulted so a record missing a branch deserializes to empty
//! values instead of failing. Records that fail to deserialize outright are
//! skipped by the parser, never fatal.

use serde::Deserialize;

/// One WAT metadata record: the JSON line following a `WARC-Target-URI`
/// header in the WAT stream.
#[derive(Debug, Default, Deserialize)]
pub struct WatRecord {
    #[serde(rename = "Envelope", default)]
    pub envelope: Envelope,
}

#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(rename = "WARC-Header-Metadata", default)]
    pub warc_header: WarcHeader,
    #[serde(rename = "Payload-Metadata", default)]
    pub payload: PayloadMetadata,
}

/// WARC headers echoed into the envelope.
#[derive(Debug, Default, Deserialize)]
pub struct WarcHeader {
    #[serde(rename = "WARC-IP-Address")]
    pub ip_address: Option<String>,
    /// Crawl timestamp, `2006-01-02T15:04:05Z` layout
    #[serde(rename = "WARC-Date")]
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayloadMetadata {
    #[serde(rename = "HTTP-Response-Metadata", default)]
    pub http_response: HttpResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpResponseMetadata {
    #[serde(rename = "HTML-Metadata", default)]
    pub html: HtmlMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct HtmlMetadata {
    #[serde(rename = "Head", default)]
    pub head: HtmlHead,
    /// Extracted anchor list; the pipeline's reason to look at a record
    #[serde(rename = "Links", default)]
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HtmlHead {
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Metas", default)]
    pub metas: Vec<MetaEntry>,
    /// `<link>` elements; carries the canonical declaration
    #[serde(rename = "Link", default)]
    pub links: Vec<HeadLinkEntry>,
}

/// A `<meta>` element from the page head.
#[derive(Debug, Default, Deserialize)]
pub struct MetaEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub property: String,
}

/// A `<link>` element from the page head.
#[derive(Debug, Default, Deserialize)]
pub struct HeadLinkEntry {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub rel: String,
}

/// One extracted outgoing link.
#[derive(Debug, Default, Deserialize)]
pub struct LinkEntry {
    /// Source element, `A@/href` for anchor hrefs
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rel: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_full_record() {
        let json = r#"{
            "Envelope": {
                "WARC-Header-Metadata": {
                    "WARC-IP-Address": "93.184.216.34",
                    "WARC-Date": "2023-06-01T12:00:00Z"
                },
                "Payload-Metadata": {
                    "HTTP-Response-Metadata": {
                        "HTML-Metadata": {
                            "Head": {
                                "Title": "Example",
                                "Metas": [{"name": "robots", "content": "index, follow"}],
                                "Link": [{"path": "LINK@/href", "url": "http://example.com/", "rel": "canonical"}]
                            },
                            "Links": [
                                {"path": "A@/href", "url": "https://other.org/x", "text": "hi", "rel": ""}
                            ]
                        }
                    }
                }
            }
        }"#;
        let record: WatRecord = serde_json::from_str(json).unwrap();
        let header = &record.envelope.warc_header;
        assert_eq!(header.ip_address.as_deref(), Some("93.184.216.34"));
        assert_eq!(header.date.as_deref(), Some("2023-06-01T12:00:00Z"));

        let html = &record.envelope.payload.http_response.html;
        assert_eq!(html.head.title.as_deref(), Some("Example"));
        assert_eq!(html.head.metas.len(), 1);
        assert_eq!(html.head.links[0].rel, "canonical");
        assert_eq!(html.links.len(), 1);
        assert_eq!(html.links[0].url, "https://other.org/x");
    }

    #[test]
    fn missing_branches_default_to_empty() {
        let record: WatRecord = serde_json::from_str(r#"{"Envelope": {}}"#).unwrap();
        assert!(record.envelope.warc_header.ip_address.is_none());
        assert!(record.envelope.payload.http_response.html.links.is_empty());
        assert!(record.envelope.payload.http_response.html.head.title.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"Container": {"Offset": "123"}, "Envelope": {"Format": "WARC"}}"#;
        assert!(serde_json::from_str::<WatRecord>(json).is_ok());
    }
}
