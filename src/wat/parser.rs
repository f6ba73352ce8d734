//! Streaming parser over a gzipped WAT file.
//!
//! The WAT stream interleaves WARC header blocks with one-line JSON
//! payloads. The parser walks it line by line, pairing every accepted
//! `WARC-Target-URI` header with the JSON record that follows it, and feeds
//! surviving pages into a [`LinkAccumulator`]. Only one record is held in
//! memory at a time besides the dedup maps.

use super::emit::LinkAccumulator;
use super::envelope::WatRecord;
use super::page::build_page;
use crate::config::FilterTables;
use crate::url::{verify_record_quality, DomainCache, UrlRecord};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Read buffer sized for the occasional multi-megabyte JSON record.
const SCAN_BUFFER_BYTES: usize = 3 * 1024 * 1024;

const URI_HEADER_PREFIX: &[u8] = b"WARC-Target-URI: http";
/// Length of `"WARC-Target-URI: "`.
const URI_HEADER_LEN: usize = 17;

#[derive(Debug, Error)]
pub enum WatError {
    #[error("failed to open wat file {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters for one parsed WAT file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Pages that produced at least one emitted link
    pub pages: usize,
    /// Deduped links accumulated
    pub links: usize,
    /// Internal-link sightings across all pages
    pub internal_links: usize,
    /// External-link sightings across all pages
    pub external_links: usize,
    /// Records dropped: malformed JSON, rejected pages, pages with no
    /// surviving links
    pub records_skipped: usize,
}

/// Streaming WAT parser bound to a set of filter tables.
pub struct WatParser {
    filters: Arc<FilterTables>,
}

impl WatParser {
    pub fn new(filters: Arc<FilterTables>) -> Self {
        Self { filters }
    }

    /// Parse a gzipped WAT file into its intermediates and delete the input.
    ///
    /// The link intermediate is always written; the page intermediate only
    /// when `page_out` is given. On any error nothing is left behind under
    /// the output paths and the input file is kept for a later retry.
    pub fn parse_file(
        &self,
        input: &Path,
        link_out: &Path,
        page_out: Option<&Path>,
    ) -> Result<ParseOutcome, WatError> {
        let file = File::open(input).map_err(|source| WatError::Open {
            path: input.display().to_string(),
            source,
        })?;
        let reader = BufReader::with_capacity(SCAN_BUFFER_BYTES, MultiGzDecoder::new(file));

        let mut accumulator = LinkAccumulator::new();
        let outcome = self.scan(reader, &mut accumulator)?;

        accumulator.write_links(link_out)?;
        if let Some(page_out) = page_out {
            accumulator.write_pages(page_out)?;
        }

        std::fs::remove_file(input)?;
        Ok(outcome)
    }

    /// Run the line state machine over an already-decompressed stream.
    pub fn scan<R: BufRead>(
        &self,
        mut reader: R,
        accumulator: &mut LinkAccumulator,
    ) -> Result<ParseOutcome, WatError> {
        let mut outcome = ParseOutcome::default();
        // One registrable-domain memo per file bounds memory over a long run.
        let mut domains = DomainCache::new();
        let mut pending: Option<UrlRecord> = None;
        let mut line: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }

            if line.starts_with(URI_HEADER_PREFIX) {
                let text = String::from_utf8_lossy(&line);
                let source = text.as_ref()[URI_HEADER_LEN..].trim();
                pending = UrlRecord::parse(source, &self.filters, &mut domains)
                    .filter(|record| verify_record_quality(record, &self.filters));
                continue;
            }

            if pending.is_some() && is_record_line(&line) {
                let Some(page_url) = pending.take() else {
                    continue;
                };
                let text = String::from_utf8_lossy(&line);
                match serde_json::from_str::<WatRecord>(&text) {
                    Ok(record) => {
                        match build_page(&record, &page_url, &self.filters, &mut domains) {
                            Some(page) if !page.links.is_empty() => {
                                outcome.pages += 1;
                                outcome.internal_links += page.internal_links;
                                outcome.external_links += page.external_links;
                                accumulator.add_page(&page);
                            }
                            _ => outcome.records_skipped += 1,
                        }
                    }
                    Err(_) => outcome.records_skipped += 1,
                }
            }
        }

        outcome.links = accumulator.link_count();
        Ok(outcome)
    }
}

/// A payload line: starts the JSON envelope and mentions at least one href.
fn is_record_line(line: &[u8]) -> bool {
    line.first() == Some(&b'{') && contains_subslice(line, b"href")
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
