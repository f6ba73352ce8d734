//! Segment ledger: the in-memory progress model for one archive import.
//!
//! The ledger is derived from the filesystem at startup and mutated only by
//! the coordinator; workers report results and never touch it.

mod layout;
pub mod manifest;

pub use layout::{tmp_sibling, DataLayout};
pub use manifest::{
    extract_wat_file_number, is_valid_archive_name, ManifestError, SegmentFilter,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One WAT file of a segment. `imported` is set only once the per-file link
/// intermediate exists on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatFile {
    /// Five-digit file number from the WAT path
    pub number: String,
    /// Remote path below the data host
    pub path: String,
    pub imported: Option<DateTime<Utc>>,
}

/// One segment of a monthly archive and its import progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatSegment {
    pub archive: String,
    /// Segment directory name, e.g. `1610703495901.0`
    pub segment: String,
    pub segment_id: u32,
    pub wat_files: Vec<WatFile>,
    pub import_started: Option<DateTime<Utc>>,
    /// Set only after the segment's compacted output is on disk
    pub import_ended: Option<DateTime<Utc>>,
}

impl WatSegment {
    /// Files still waiting for a successful parse.
    pub fn pending_files(&self) -> usize {
        self.wat_files.iter().filter(|f| f.imported.is_none()).count()
    }

    /// Mark a file imported by its number. Returns false when the number is
    /// unknown to this segment.
    pub fn mark_file_imported(&mut self, number: &str) -> bool {
        match self.wat_files.iter_mut().find(|f| f.number == number) {
            Some(file) => {
                file.imported = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Record the first dispatch into this segment.
    pub fn mark_started(&mut self) {
        if self.import_started.is_none() {
            self.import_started = Some(Utc::now());
        }
    }

    pub fn mark_ended(&mut self) {
        self.import_ended = Some(Utc::now());
    }

    pub fn is_ended(&self) -> bool {
        self.import_ended.is_some()
    }
}

/// The first not-yet-ended segment, by ascending segment id.
pub fn select_segment_to_import(segments: &[WatSegment]) -> Option<&WatSegment> {
    segments.iter().find(|s| !s.is_ended())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(files: Vec<WatFile>) -> WatSegment {
        WatSegment {
            archive: "CC-MAIN-2024-33".to_string(),
            segment: "1722640001000.0".to_string(),
            segment_id: 0,
            wat_files: files,
            import_started: None,
            import_ended: None,
        }
    }

    fn file(number: &str, imported: bool) -> WatFile {
        WatFile {
            number: number.to_string(),
            path: format!("crawl-data/seg/wat/CC-MAIN-x-{}.warc.wat.gz", number),
            imported: imported.then(Utc::now),
        }
    }

    #[test]
    fn pending_counts_unimported_files() {
        let seg = segment(vec![
            file("00001", true),
            file("00002", false),
            file("00003", true),
            file("00004", false),
        ]);
        assert_eq!(seg.pending_files(), 2);
    }

    #[test]
    fn mark_file_imported_by_number() {
        let mut seg = segment(vec![file("00010", false), file("00011", false)]);
        assert!(seg.mark_file_imported("00010"));
        assert_eq!(seg.pending_files(), 1);
        assert!(!seg.mark_file_imported("99999"));
    }

    #[test]
    fn mark_started_is_idempotent() {
        let mut seg = segment(vec![]);
        seg.mark_started();
        let first = seg.import_started;
        seg.mark_started();
        assert_eq!(seg.import_started, first);
        assert!(first.is_some());
    }

    #[test]
    fn selects_first_unfinished_segment() {
        let mut done = segment(vec![]);
        done.mark_ended();
        let mut segments = vec![done, segment(vec![]), segment(vec![])];
        segments[1].segment_id = 1;
        segments[2].segment_id = 2;

        let picked = select_segment_to_import(&segments).unwrap();
        assert_eq!(picked.segment_id, 1);

        for seg in &mut segments {
            seg.mark_ended();
        }
        assert!(select_segment_to_import(&segments).is_none());
    }
}
