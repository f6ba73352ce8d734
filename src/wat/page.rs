//! Page-level record assembly: WARC metadata, robots directives, and the
//! canonical-link gate.

use super::envelope::{HeadLinkEntry, MetaEntry, WatRecord};
use super::links::{extract_links, LinkExtraction};
use crate::config::FilterTables;
use crate::url::{DomainCache, UrlRecord};
use chrono::NaiveDateTime;
use url::Url;

/// One crawled page that survived every page-level gate.
#[derive(Debug)]
pub struct WatPage {
    pub url: UrlRecord,
    pub ip: String,
    /// Crawl date, `YYYY-MM-DD`
    pub imported: String,
    pub title: String,
    pub no_index: bool,
    pub no_follow: bool,
    pub internal_links: usize,
    pub external_links: usize,
    /// External links that passed every link-level filter
    pub links: Vec<UrlRecord>,
}

/// Assemble a page from a deserialized WAT record.
///
/// Returns `None` when the page is rejected: no extracted links, missing
/// WARC IP or date, robots noindex, or a canonical link pointing away from
/// the page. Counting semantics for the returned links live in
/// [`extract_links`].
pub fn build_page(
    record: &WatRecord,
    page_url: &UrlRecord,
    filters: &FilterTables,
    domains: &mut DomainCache,
) -> Option<WatPage> {
    let html = &record.envelope.payload.http_response.html;
    if html.links.is_empty() {
        return None;
    }

    let header = &record.envelope.warc_header;
    let ip = header.ip_address.clone().filter(|ip| !ip.is_empty())?;
    let imported = format_warc_date(header.date.as_deref()?)?;

    let title = html.head.title.clone().unwrap_or_default();
    let (no_index, no_follow) = robots_directives(&html.head.metas);

    if no_index {
        return None;
    }
    if !canonical_permits_page(&html.head.links, page_url) {
        return None;
    }

    let LinkExtraction {
        links,
        internal,
        external,
    } = extract_links(&html.links, page_url, no_follow, filters, domains);

    Some(WatPage {
        url: page_url.clone(),
        ip,
        imported,
        title,
        no_index,
        no_follow,
        internal_links: internal,
        external_links: external,
        links,
    })
}

/// Reformat a WARC timestamp to `YYYY-MM-DD`.
pub fn format_warc_date(raw: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|dt| dt.date().format("%Y-%m-%d").to_string())
}

/// Robots `<meta>` flags: (noindex, nofollow).
pub fn robots_directives(metas: &[MetaEntry]) -> (bool, bool) {
    let mut no_index = false;
    let mut no_follow = false;
    for meta in metas {
        if meta.name == "robots" {
            if meta.content.contains("noindex") {
                no_index = true;
            }
            if meta.content.contains("nofollow") {
                no_follow = true;
            }
        }
    }
    (no_index, no_follow)
}

/// The canonical-link gate.
///
/// A page with no canonical declaration passes. With one, the page passes
/// only when the canonical points at the page itself: same host, same path
/// (an empty canonical path counts as `/`), and no raw query on the page.
/// An absolute canonical URL that fails to parse rejects the page.
pub fn canonical_permits_page(head_links: &[HeadLinkEntry], page: &UrlRecord) -> bool {
    for link in head_links {
        if link.rel != "canonical" || link.url.is_empty() {
            continue;
        }

        let mut candidate = link.url.clone();
        if candidate.starts_with("http") || candidate.starts_with("//") {
            let absolute = if let Some(rest) = candidate.strip_prefix("//") {
                format!("http://{}", rest)
            } else {
                candidate.clone()
            };
            let parsed = match Url::parse(&absolute) {
                Ok(parsed) => parsed,
                Err(_) => return false,
            };
            if parsed.host_str().unwrap_or_default() != page.host {
                return false;
            }
            candidate = parsed.path().to_string();
        }

        if candidate.is_empty() {
            candidate = "/".to_string();
        }
        if candidate != page.path {
            return false;
        }
        if !page.raw_query.is_empty() {
            return false;
        }
    }
    true
}
