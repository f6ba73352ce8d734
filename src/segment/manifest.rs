//! Archive manifest handling: `wat.paths.gz` parsing and target selection.

use super::{WatFile, WatSegment};
use flate2::read::MultiGzDecoder;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid archive name: {0}")]
    InvalidArchive(String),
    #[error("invalid segment spec: {0}")]
    InvalidSegmentSpec(String),
    #[error("wat path has no file number: {0}")]
    MissingFileNumber(String),
    #[error("cannot derive segment id from segment name: {0}")]
    BadSegmentName(String),
}

fn archive_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^CC-MAIN-\d{4}-\d{2}$").expect("static regex"))
}

fn wat_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-(\d+)\.warc\.wat\.gz$").expect("static regex"))
}

/// Monthly archive names look like `CC-MAIN-2024-33`.
pub fn is_valid_archive_name(name: &str) -> bool {
    archive_name_re().is_match(name)
}

/// The file number preceding `.warc.wat.gz` in a WAT path.
pub fn extract_wat_file_number(path: &str) -> Option<String> {
    wat_number_re()
        .captures(path)
        .map(|caps| caps[1].to_string())
}

/// Parse the decompressed `wat.paths.gz` listing into segments ordered by
/// segment id, each with its WAT files ordered by file number.
///
/// Lines look like
/// `crawl-data/CC-MAIN-2024-33/segments/1722640001000.0/wat/CC-MAIN-…-00042.warc.wat.gz`;
/// anything without a segment component is ignored.
pub fn parse_wat_paths<I, S>(lines: I, archive: &str) -> Result<Vec<WatSegment>, ManifestError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut by_segment: BTreeMap<String, Vec<WatFile>> = BTreeMap::new();

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('/').collect();
        if parts.len() <= 4 {
            continue;
        }
        let segment = parts[3].to_string();
        let number = extract_wat_file_number(line)
            .ok_or_else(|| ManifestError::MissingFileNumber(line.to_string()))?;
        by_segment.entry(segment).or_default().push(WatFile {
            number,
            path: line.to_string(),
            imported: None,
        });
    }

    let mut segments = Vec::with_capacity(by_segment.len());
    for (segment, mut wat_files) in by_segment {
        let segment_id = segment
            .split('.')
            .nth(1)
            .and_then(|id| id.parse::<u32>().ok())
            .ok_or_else(|| ManifestError::BadSegmentName(segment.clone()))?;
        wat_files.sort_by(|a, b| a.number.cmp(&b.number));
        segments.push(WatSegment {
            archive: archive.to_string(),
            segment,
            segment_id,
            wat_files,
            import_started: None,
            import_ended: None,
        });
    }
    segments.sort_by_key(|s| s.segment_id);
    Ok(segments)
}

/// Decompress a gzipped text file into its lines.
pub fn read_gz_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let reader = BufReader::new(MultiGzDecoder::new(File::open(path)?));
    reader.lines().collect()
}

/// Which segments a run should touch: an explicit id list (`2,3,5`), a
/// closed range (`0-10`), or everything not yet ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentFilter {
    List(Vec<u32>),
    Range(u32, u32),
}

impl SegmentFilter {
    pub fn matches(&self, segment_id: u32) -> bool {
        match self {
            Self::List(ids) => ids.contains(&segment_id),
            Self::Range(lo, hi) => (*lo..=*hi).contains(&segment_id),
        }
    }
}

impl FromStr for SegmentFilter {
    type Err = ManifestError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        let invalid = || ManifestError::InvalidSegmentSpec(spec.to_string());

        if let Some((lo, hi)) = spec.split_once('-') {
            let lo: u32 = lo.trim().parse().map_err(|_| invalid())?;
            let hi: u32 = hi.trim().parse().map_err(|_| invalid())?;
            if lo > hi {
                return Err(invalid());
            }
            return Ok(Self::Range(lo, hi));
        }

        let ids = spec
            .split(',')
            .map(|id| id.trim().parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<u32>, _>>()?;
        if ids.is_empty() {
            return Err(invalid());
        }
        Ok(Self::List(ids))
    }
}
