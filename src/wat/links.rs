//! Outbound link extraction and classification.

use super::envelope::LinkEntry;
use crate::config::FilterTables;
use crate::url::{verify_record_quality, DomainCache, UrlRecord};

/// Links that survived filtering, plus the page's link counters.
#[derive(Debug, Default)]
pub struct LinkExtraction {
    pub links: Vec<UrlRecord>,
    pub internal: usize,
    pub external: usize,
}

/// Walk the record's anchor list and classify every entry.
///
/// Counting rules:
/// - non-anchor entries and unparseable URLs are not counted at all;
/// - relative URLs and links back to the page host count as internal;
/// - same-registrable-domain links count as external but are not kept;
/// - links failing the quality gate or the domain denylist count as
///   external but are not kept;
/// - links with a denylisted file extension are dropped without counting;
/// - everything else counts as external and is kept.
pub fn extract_links(
    entries: &[LinkEntry],
    page: &UrlRecord,
    page_no_follow: bool,
    filters: &FilterTables,
    domains: &mut DomainCache,
) -> LinkExtraction {
    let mut out = LinkExtraction::default();

    for entry in entries {
        if entry.path != "A@/href" {
            continue;
        }
        if !entry.url.starts_with("http") && !entry.url.starts_with("//") {
            out.internal += 1;
            continue;
        }

        let no_follow = page_no_follow || entry.rel.starts_with("nofollow");

        let link = match UrlRecord::parse(&entry.url, filters, domains) {
            Some(link) => link.with_text(&entry.text).with_no_follow(no_follow),
            None => continue,
        };

        if link.host == page.host {
            out.internal += 1;
            continue;
        }
        if link.domain == page.domain {
            out.external += 1;
            continue;
        }
        if !verify_record_quality(&link, filters) {
            out.external += 1;
            continue;
        }
        if filters.is_ignored_extension(&link.path) {
            continue;
        }
        if filters.is_ignored_domain(&link.domain) {
            out.external += 1;
            continue;
        }

        out.external += 1;
        out.links.push(link);
    }

    out
}
