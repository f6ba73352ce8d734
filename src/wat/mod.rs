//! WAT stream parsing: from gzipped crawl metadata to per-file link
//! intermediates.

mod emit;
mod envelope;
mod links;
mod page;
mod parser;

pub use emit::{FileLink, FilePage, LinkAccumulator};
pub use envelope::{HeadLinkEntry, LinkEntry, MetaEntry, WatRecord};
pub use links::{extract_links, LinkExtraction};
pub use page::{build_page, canonical_permits_page, format_warc_date, robots_directives, WatPage};
pub use parser::{ParseOutcome, WatError, WatParser};
