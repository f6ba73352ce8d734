//! Linear compaction of a sorted link stream.
//!
//! Input records sharing (link domain, subdomain, path, raw query, page
//! host) are adjacent in the sorted stream, so one accumulator suffices:
//! each group collapses to a single representative with a date range and an
//! occurrence count. Memory stays flat regardless of input size.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Output rows buffered between writes.
const FLUSH_EVERY: usize = 10_000;

#[derive(Debug, Error)]
pub enum CompactError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters for one compaction run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
    pub lines_read: usize,
    pub records_written: usize,
    pub malformed_lines: usize,
}

/// One compacted link record: the 16-field output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactedLink {
    pub link_domain: String,
    pub link_subdomain: String,
    pub link_path: String,
    pub link_raw_query: String,
    pub link_scheme: String,
    pub page_host: String,
    pub page_path: String,
    pub page_raw_query: String,
    pub page_scheme: String,
    pub link_text: String,
    pub no_follow: u8,
    pub no_index: u8,
    pub date_from: String,
    pub date_to: String,
    pub ip: String,
    pub qty: u64,
}

impl CompactedLink {
    /// Parse a pipe-delimited row. Accepts the 14-field intermediate form
    /// (single date, qty seeded to 1) and the 16-field compacted form, so
    /// compacting an already-compacted stream is well defined.
    pub fn from_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split('|').collect();
        let (date_from, date_to, ip, qty) = match fields.len() {
            14 => (fields[12], fields[12], fields[13], 1),
            16 => (
                fields[12],
                fields[13],
                fields[14],
                fields[15].parse().ok()?,
            ),
            _ => return None,
        };
        Some(Self {
            link_domain: fields[0].to_string(),
            link_subdomain: fields[1].to_string(),
            link_path: fields[2].to_string(),
            link_raw_query: fields[3].to_string(),
            link_scheme: fields[4].to_string(),
            page_host: fields[5].to_string(),
            page_path: fields[6].to_string(),
            page_raw_query: fields[7].to_string(),
            page_scheme: fields[8].to_string(),
            link_text: fields[9].to_string(),
            no_follow: flag_value(fields[10]),
            no_index: flag_value(fields[11]),
            date_from: date_from.to_string(),
            date_to: date_to.to_string(),
            ip: ip.to_string(),
            qty,
        })
    }

    /// The 16-field output row.
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.link_domain,
            self.link_subdomain,
            self.link_path,
            self.link_raw_query,
            self.link_scheme,
            self.page_host,
            self.page_path,
            self.page_raw_query,
            self.page_scheme,
            self.link_text,
            self.no_follow,
            self.no_index,
            self.date_from,
            self.date_to,
            self.ip,
            self.qty,
        )
    }

    fn same_group(&self, other: &Self) -> bool {
        self.link_domain == other.link_domain
            && self.link_subdomain == other.link_subdomain
            && self.link_path == other.link_path
            && self.link_raw_query == other.link_raw_query
            && self.page_host == other.page_host
    }
}

fn flag_value(field: &str) -> u8 {
    u8::from(field == "1")
}

/// Fold `current` into the group accumulator.
///
/// A nofollow sighting is ignored entirely while the accumulator is
/// dofollow; the early return deliberately skips the date-range update too,
/// so suppressed sightings never widen the window. The page-URL
/// representative prefers the shorter path, then the shorter query, and
/// `qty` counts the distinct page-URL variants seen for the group.
fn merge_into(accumulator: &mut CompactedLink, current: CompactedLink) {
    if accumulator.no_follow == 0 && current.no_follow == 1 {
        return;
    }

    if current.date_from < accumulator.date_from {
        accumulator.date_from = current.date_from;
    }
    if current.date_to > accumulator.date_to {
        accumulator.date_to = current.date_to;
    }

    // Latest sighting wins; a heuristic, not a union.
    accumulator.ip = current.ip;

    if current.page_path != accumulator.page_path
        || current.page_raw_query != accumulator.page_raw_query
    {
        if current.page_path.len() < accumulator.page_path.len()
            && current.page_raw_query.len() <= accumulator.page_raw_query.len()
        {
            accumulator.page_path = current.page_path;
            accumulator.page_raw_query = current.page_raw_query;
        } else if current.page_path.len() == accumulator.page_path.len()
            && current.page_raw_query.len() < accumulator.page_raw_query.len()
        {
            accumulator.page_raw_query = current.page_raw_query;
        }
        accumulator.qty += 1;
    }
}

/// Compact a sorted stream of pipe-delimited records.
pub fn compact_stream<R: BufRead, W: Write>(
    input: R,
    mut output: W,
) -> Result<CompactStats, CompactError> {
    let mut stats = CompactStats::default();
    let mut accumulator: Option<CompactedLink> = None;
    let mut batch: Vec<String> = Vec::with_capacity(FLUSH_EVERY);

    for line in input.lines() {
        let line = line?;
        stats.lines_read += 1;

        let record = match CompactedLink::from_line(&line) {
            Some(record) => record,
            None => {
                stats.malformed_lines += 1;
                continue;
            }
        };

        let same_group = accumulator
            .as_ref()
            .is_some_and(|group| group.same_group(&record));

        if same_group {
            if let Some(group) = accumulator.as_mut() {
                merge_into(group, record);
            }
        } else if let Some(finished) = accumulator.replace(record) {
            emit(&mut batch, finished, &mut output, &mut stats)?;
        }
    }

    if let Some(finished) = accumulator {
        emit(&mut batch, finished, &mut output, &mut stats)?;
    }
    flush_batch(&mut batch, &mut output)?;
    output.flush()?;

    Ok(stats)
}

fn emit<W: Write>(
    batch: &mut Vec<String>,
    record: CompactedLink,
    output: &mut W,
    stats: &mut CompactStats,
) -> Result<(), CompactError> {
    batch.push(record.to_line());
    stats.records_written += 1;
    if batch.len() >= FLUSH_EVERY {
        flush_batch(batch, output)?;
    }
    Ok(())
}

fn flush_batch<W: Write>(batch: &mut Vec<String>, output: &mut W) -> Result<(), CompactError> {
    for line in batch.drain(..) {
        writeln!(output, "{}", line)?;
    }
    Ok(())
}

/// Compact a gzipped sorted file into a gzipped compacted file. The output
/// is written through a `.tmp` sibling and renamed on success.
pub fn compact_gzip_file(input: &Path, output: &Path) -> Result<CompactStats, CompactError> {
    let file = File::open(input).map_err(|source| CompactError::Open {
        path: input.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(MultiGzDecoder::new(file));

    let tmp = crate::segment::tmp_sibling(output);
    let result = (|| {
        let writer = GzEncoder::new(
            BufWriter::new(File::create(&tmp)?),
            Compression::default(),
        );
        let mut writer = BufWriter::new(writer);
        let stats = compact_stream(reader, &mut writer)?;
        writer
            .into_inner()
            .map_err(|e| CompactError::Io(e.into_error()))?
            .finish()?
            .flush()?;
        Ok(stats)
    })();

    match result {
        Ok(stats) => {
            std::fs::rename(&tmp, output)?;
            Ok(stats)
        }
        Err(err) => {
            let _ = std::fs::remove_file(&tmp);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn line(
        key: (&str, &str, &str, &str, &str),
        page_path: &str,
        page_query: &str,
        no_follow: u8,
        date: &str,
        ip: &str,
    ) -> String {
        let (domain, subdomain, path, query, page_host) = key;
        format!(
            "{}|{}|{}|{}|2|{}|{}|{}|2|text|{}|0|{}|{}",
            domain, subdomain, path, query, page_host, page_path, page_query, no_follow, date, ip
        )
    }

    fn compact_lines(lines: &[String]) -> (Vec<String>, CompactStats) {
        let input = lines.join("\n");
        let mut out = Vec::new();
        let stats = compact_stream(Cursor::new(input.into_bytes()), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        (text.lines().map(str::to_string).collect(), stats)
    }

    const KEY: (&str, &str, &str, &str, &str) = ("b.com", "", "/x", "", "a.com");

    #[test]
    fn singleton_group_passes_through() {
        let (out, stats) = compact_lines(&[line(KEY, "/", "", 0, "2023-06-01", "1.1.1.1")]);
        assert_eq!(out.len(), 1);
        assert_eq!(stats.records_written, 1);
        let fields: Vec<&str> = out[0].split('|').collect();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[12], "2023-06-01");
        assert_eq!(fields[13], "2023-06-01");
        assert_eq!(fields[15], "1");
    }

    #[test]
    fn dofollow_dominates_and_suppressed_dates_do_not_widen() {
        let (out, _) = compact_lines(&[
            line(KEY, "/", "", 0, "2023-01-01", "1.1.1.1"),
            line(KEY, "/", "", 1, "2023-06-01", "2.2.2.2"),
            line(KEY, "/", "", 0, "2023-12-01", "3.3.3.3"),
        ]);
        assert_eq!(out.len(), 1);
        let fields: Vec<&str> = out[0].split('|').collect();
        assert_eq!(fields[10], "0", "nofollow flag");
        assert_eq!(fields[12], "2023-01-01", "date_from");
        assert_eq!(fields[13], "2023-12-01", "date_to");
        assert_eq!(fields[14], "3.3.3.3", "latest ip wins");
        assert_eq!(fields[15], "1", "suppressed and same-page records leave qty");
    }

    #[test]
    fn suppressed_trailing_nofollow_keeps_window_closed() {
        let (out, _) = compact_lines(&[
            line(KEY, "/", "", 0, "2023-05-01", "1.1.1.1"),
            line(KEY, "/", "", 1, "2023-12-01", "2.2.2.2"),
        ]);
        let fields: Vec<&str> = out[0].split('|').collect();
        assert_eq!(fields[13], "2023-05-01");
        assert_eq!(fields[14], "1.1.1.1");
    }

    #[test]
    fn nofollow_accumulator_merges_dofollow_sightings() {
        let (out, _) = compact_lines(&[
            line(KEY, "/", "", 1, "2023-01-01", "1.1.1.1"),
            line(KEY, "/", "", 0, "2023-06-01", "2.2.2.2"),
        ]);
        let fields: Vec<&str> = out[0].split('|').collect();
        // Suppression only runs dofollow-over-nofollow; the reverse merges.
        assert_eq!(fields[10], "1");
        assert_eq!(fields[13], "2023-06-01");
    }

    #[test]
    fn distinct_page_urls_bump_qty_and_prefer_shorter_path() {
        let (out, _) = compact_lines(&[
            line(KEY, "/long/path", "q=1", 0, "2023-01-01", "1.1.1.1"),
            line(KEY, "/a", "", 0, "2023-02-01", "1.1.1.1"),
        ]);
        let fields: Vec<&str> = out[0].split('|').collect();
        assert_eq!(fields[6], "/a");
        assert_eq!(fields[7], "");
        assert_eq!(fields[15], "2");
    }

    #[test]
    fn equal_paths_prefer_shorter_query() {
        let (out, _) = compact_lines(&[
            line(KEY, "/p", "query=long", 0, "2023-01-01", "1.1.1.1"),
            line(KEY, "/p", "q=1", 0, "2023-02-01", "1.1.1.1"),
        ]);
        let fields: Vec<&str> = out[0].split('|').collect();
        assert_eq!(fields[6], "/p");
        assert_eq!(fields[7], "q=1");
        assert_eq!(fields[15], "2");
    }

    #[test]
    fn longer_page_url_still_counts_a_variant() {
        let (out, _) = compact_lines(&[
            line(KEY, "/a", "", 0, "2023-01-01", "1.1.1.1"),
            line(KEY, "/bbbb", "", 0, "2023-02-01", "1.1.1.1"),
        ]);
        let fields: Vec<&str> = out[0].split('|').collect();
        assert_eq!(fields[6], "/a", "shorter representative kept");
        assert_eq!(fields[15], "2");
    }

    #[test]
    fn key_change_emits_previous_group() {
        let other = ("c.com", "", "/y", "", "a.com");
        let (out, stats) = compact_lines(&[
            line(KEY, "/", "", 0, "2023-01-01", "1.1.1.1"),
            line(other, "/", "", 0, "2023-02-01", "1.1.1.1"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(stats.records_written, 2);
        assert!(out[0].starts_with("b.com|"));
        assert!(out[1].starts_with("c.com|"));
    }

    #[test]
    fn page_host_is_part_of_the_group_key() {
        let other_page = ("b.com", "", "/x", "", "z.org");
        let (out, _) = compact_lines(&[
            line(KEY, "/", "", 0, "2023-01-01", "1.1.1.1"),
            line(other_page, "/", "", 0, "2023-02-01", "1.1.1.1"),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn malformed_lines_are_counted_and_skipped() {
        let (out, stats) = compact_lines(&[
            "not|enough|fields".to_string(),
            line(KEY, "/", "", 0, "2023-01-01", "1.1.1.1"),
        ]);
        assert_eq!(stats.malformed_lines, 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn compacted_output_is_a_fixed_point() {
        let (first, _) = compact_lines(&[
            line(KEY, "/", "", 0, "2023-01-01", "1.1.1.1"),
            line(KEY, "/", "", 0, "2023-06-01", "1.1.1.1"),
        ]);
        let (second, stats) = compact_lines(&first);
        assert_eq!(first, second);
        assert_eq!(stats.malformed_lines, 0);
    }

    #[test]
    fn empty_input_writes_nothing() {
        let (out, stats) = compact_lines(&[]);
        assert!(out.is_empty());
        assert_eq!(stats, CompactStats::default());
    }

    #[test]
    fn gzip_roundtrip_through_files() {
        use flate2::write::GzEncoder;
        use std::io::Write;

        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("sort_0.txt.gz");
        let output = tmp.path().join("compact_0.txt.gz");

        let mut enc = GzEncoder::new(File::create(&input).unwrap(), Compression::default());
        writeln!(enc, "{}", line(KEY, "/", "", 0, "2023-01-01", "1.1.1.1")).unwrap();
        writeln!(enc, "{}", line(KEY, "/", "", 0, "2023-03-01", "1.1.1.1")).unwrap();
        enc.finish().unwrap();

        let stats = compact_gzip_file(&input, &output).unwrap();
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.records_written, 1);
        assert!(output.exists());
        assert!(!crate::segment::tmp_sibling(&output).exists());

        let mut content = String::new();
        std::io::Read::read_to_string(
            &mut BufReader::new(MultiGzDecoder::new(File::open(&output).unwrap())),
            &mut content,
        )
        .unwrap();
        let fields: Vec<&str> = content.trim().split('|').collect();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[12], "2023-01-01");
        assert_eq!(fields[13], "2023-03-01");
    }
}
