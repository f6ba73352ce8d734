//! Link filter tables: compiled-in denylists applied during URL filtering.
//!
//! The tables are static slices materialized once into [`FilterTables`]
//! before any worker spawns, then shared read-only. Membership checks run on
//! every extracted link, so the hot lookups use `HashSet`s.

use std::collections::HashSet;

/// Path extensions that mark a link as a file download rather than a page.
/// Matched case-insensitively against the final `.ext` of the link path.
pub const FILE_EXTENSIONS: &[&str] = &[
    ".7z", ".aac", ".apk", ".avi", ".bin", ".bmp", ".bz2", ".css", ".csv",
    ".dat", ".deb", ".dmg", ".doc", ".docx", ".eot", ".eps", ".exe", ".flac",
    ".flv", ".gif", ".gz", ".ico", ".iso", ".jar", ".jpeg", ".jpg", ".js",
    ".json", ".m4a", ".m4v", ".mid", ".mkv", ".mov", ".mp3", ".mp4", ".mpeg",
    ".mpg", ".msi", ".odp", ".ods", ".odt", ".ogg", ".otf", ".pdf", ".png",
    ".pps", ".ppt", ".pptx", ".psd", ".rar", ".rpm", ".rss", ".rtf", ".svg",
    ".swf", ".tar", ".tgz", ".tif", ".tiff", ".ttf", ".txt", ".wav", ".webm",
    ".webp", ".wma", ".wmv", ".woff", ".woff2", ".xls", ".xlsx", ".xml",
    ".xz", ".zip",
];

/// Hosts whose links are tracking or affiliate noise, never real backlinks.
pub const IGNORE_DOMAINS: &[&str] = &[
    "addthis.com",
    "addtoany.com",
    "amazonaws.com",
    "blogspot.com",
    "clickbank.net",
    "doubleclick.net",
    "feedburner.com",
    "google-analytics.com",
    "googleadservices.com",
    "googlesyndication.com",
    "googletagmanager.com",
    "gravatar.com",
    "sharethis.com",
    "shareasale.com",
    "tumblr.com",
    "wordpress.com",
];

/// TLD suffixes excluded from the dataset.
pub const IGNORE_TLD: &[&str] = &[".cn", ".xn--fiqs8s", ".xn--fiqz9s"];

/// Query-string prefixes that carry tracking state; a matching raw query is
/// blanked while the record itself is kept.
pub const IGNORE_QUERY: &[&str] = &[
    "fbclid=",
    "gclid=",
    "lang=",
    "mc_cid=",
    "mc_eid=",
    "msclkid=",
    "ref=",
    "utm_",
];

/// Immutable filter tables, built once per process and shared across workers.
#[derive(Debug)]
pub struct FilterTables {
    extensions: HashSet<String>,
    domains: HashSet<String>,
    tld_suffixes: Vec<String>,
    query_prefixes: Vec<String>,
}

impl FilterTables {
    /// Materialize the compiled-in tables.
    pub fn new() -> Self {
        Self::from_parts(FILE_EXTENSIONS, IGNORE_DOMAINS, IGNORE_TLD, IGNORE_QUERY)
    }

    /// Build tables from explicit slices (used by tests).
    pub fn from_parts(
        extensions: &[&str],
        domains: &[&str],
        tld_suffixes: &[&str],
        query_prefixes: &[&str],
    ) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            domains: domains.iter().map(|d| d.to_ascii_lowercase()).collect(),
            tld_suffixes: tld_suffixes.iter().map(|t| t.to_string()).collect(),
            query_prefixes: query_prefixes.iter().map(|q| q.to_string()).collect(),
        }
    }

    /// True when the final `.ext` of `path` is on the extension denylist.
    pub fn is_ignored_extension(&self, path: &str) -> bool {
        match last_extension(path) {
            Some(ext) => self.extensions.contains(&ext),
            None => false,
        }
    }

    /// True when `domain` is on the exact-host denylist.
    pub fn is_ignored_domain(&self, domain: &str) -> bool {
        self.domains.contains(&domain.to_ascii_lowercase())
    }

    /// True when `domain` ends with an ignored TLD suffix.
    pub fn is_ignored_tld(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        self.tld_suffixes.iter().any(|tld| domain.ends_with(tld))
    }

    /// True when the raw query begins with an ignored tracking prefix.
    pub fn is_ignored_query(&self, query: &str) -> bool {
        self.query_prefixes.iter().any(|p| query.starts_with(p))
    }
}

impl Default for FilterTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased `.ext` of the last path component, or `None` when the
/// component has no dot.
fn last_extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.')
        .map(|idx| name[idx..].to_ascii_lowercase())
        .filter(|ext| ext.len() > 1)
}
