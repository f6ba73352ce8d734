//! URL normalization into pipeline records.

use super::domain_cache::DomainCache;
use crate::config::FilterTables;
use serde::{Deserialize, Serialize};
use url::Url;

/// URL scheme encoded the way the output formats expect it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    Https,
    Http,
    #[default]
    Other,
}

impl Scheme {
    /// Wire encoding: `"2"` https, `"1"` http, `"0"` anything else.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Https => "2",
            Self::Http => "1",
            Self::Other => "0",
        }
    }

    fn from_scheme_str(scheme: &str) -> Self {
        match scheme {
            "https" => Self::Https,
            "http" => Self::Http,
            _ => Self::Other,
        }
    }
}

/// A normalized URL. Construction via [`UrlRecord::parse`] either yields a
/// fully populated record or nothing; every field of an accepted record is
/// safe to read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlRecord {
    /// Original URL string as seen in the crawl data
    pub url: String,
    pub scheme: Scheme,
    /// Lowercased, trimmed host
    pub host: String,
    /// Never empty; `"/"` stands in for an empty path
    pub path: String,
    /// Possibly blanked by the ignore-query rule
    pub raw_query: String,
    pub fragment: String,
    /// Registrable domain (public suffix plus one label)
    pub domain: String,
    /// Host with `"." + domain` stripped; empty when host equals domain
    pub subdomain: String,
    /// Anchor text carried along for links; empty for page URLs
    pub text: String,
    /// Link-level nofollow, seeded from the page and overridden per link
    pub no_follow: bool,
}

impl UrlRecord {
    /// Normalize `source` into a record.
    ///
    /// Rejections (returning `None`): embedded newline, unparseable URL,
    /// `\n` or `|` in the path, no registrable domain. A scheme-relative
    /// `//host/path` source is accepted and keeps scheme code `"0"`.
    pub fn parse(
        source: &str,
        filters: &FilterTables,
        domains: &mut DomainCache,
    ) -> Option<Self> {
        if source.contains('\n') {
            return None;
        }

        // The url crate refuses scheme-relative references; borrow an http
        // prefix for structure while keeping the original scheme encoding.
        let (parsed, scheme) = if let Some(rest) = source.strip_prefix("//") {
            let parsed = Url::parse(&format!("http://{}", rest)).ok()?;
            (parsed, Scheme::Other)
        } else {
            let parsed = Url::parse(source).ok()?;
            let scheme = Scheme::from_scheme_str(parsed.scheme());
            (parsed, scheme)
        };

        let path = parsed.path();
        if path.contains('\n') || path.contains('|') {
            return None;
        }
        let path = if path.is_empty() { "/" } else { path };

        let host = parsed
            .host_str()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let domain = domains.registrable(&host)?;
        let subdomain = derive_subdomain(&host, &domain);

        let mut raw_query = parsed.query().unwrap_or_default().to_string();
        if filters.is_ignored_query(&raw_query) {
            raw_query.clear();
        }

        Some(Self {
            url: source.to_string(),
            scheme,
            host,
            path: path.to_string(),
            raw_query,
            fragment: parsed.fragment().unwrap_or_default().to_string(),
            domain,
            subdomain,
            text: String::new(),
            no_follow: false,
        })
    }

    /// Attach anchor text.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Attach the effective nofollow flag.
    pub fn with_no_follow(mut self, no_follow: bool) -> Self {
        self.no_follow = no_follow;
        self
    }
}

/// Host minus the registrable domain; empty when they coincide.
fn derive_subdomain(host: &str, domain: &str) -> String {
    if host == domain {
        return String::new();
    }
    host.strip_suffix(domain)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .unwrap_or(host)
        .to_string()
}
