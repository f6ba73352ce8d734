//! Segment coordinator: drives download → parse → sort → compact for every
//! targeted segment under a bounded worker pool.
//!
//! Progress is reconstructed from filesystem artifacts at startup, never
//! from a separate state file: an existing intermediate means the file is
//! imported, an existing sort or compact output means the segment is done.
//! Workers return results over the join set and the coordinator is the only
//! mutator of the ledger.

use super::compact::{compact_gzip_file, CompactError};
use super::sort::{SortError, SortedMerge, SystemSort};
use crate::config::{FilterTables, ImportConfig};
use crate::fetch::{FetchError, Fetcher};
use crate::segment::manifest::{self, read_gz_lines, ManifestError};
use crate::segment::{DataLayout, SegmentFilter, WatFile, WatSegment};
use crate::wat::{ParseOutcome, WatError, WatParser};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Sort(#[from] SortError),
    #[error(transparent)]
    Compact(#[from] CompactError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker task failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
enum WorkerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Wat(#[from] WatError),
    #[error("parse task panicked")]
    Panicked,
}

/// Summary of one import run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportReport {
    pub segments_completed: usize,
    pub files_imported: usize,
    pub files_failed: usize,
    pub links_emitted: usize,
}

/// Drives the per-segment pipeline for one archive.
pub struct ImportCoordinator {
    config: ImportConfig,
    layout: DataLayout,
    fetcher: Fetcher,
    filters: Arc<FilterTables>,
    sorter: Arc<dyn SortedMerge>,
}

impl ImportCoordinator {
    pub fn new(config: ImportConfig) -> Result<Self, PipelineError> {
        let layout = DataLayout::new(&config.data_dir);
        let fetcher = Fetcher::new(config.download_retries)?;
        Ok(Self {
            config,
            layout,
            fetcher,
            filters: Arc::new(FilterTables::new()),
            sorter: Arc::new(SystemSort::default()),
        })
    }

    /// Swap the merge implementation (tests).
    pub fn with_sorter(mut self, sorter: Arc<dyn SortedMerge>) -> Self {
        self.sorter = sorter;
        self
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Run the import for `archive`, touching only segments matched by
    /// `filter` (all not-yet-ended segments when absent), until the WAT file
    /// budget is spent or every target segment is done.
    pub async fn run(
        &self,
        archive: &str,
        filter: Option<&SegmentFilter>,
    ) -> Result<ImportReport, PipelineError> {
        self.layout.ensure_base_dirs()?;
        let mut segments = self.load_segments(archive).await?;
        reconcile_progress(&self.layout, &mut segments);

        info!(
            "archive {}: {} segments, budget {} files, {} workers",
            archive,
            segments.len(),
            self.config.max_wat_files,
            self.config.max_threads
        );

        let mut report = ImportReport::default();
        let mut budget = self.config.max_wat_files;

        for segment in &mut segments {
            if let Some(filter) = filter {
                if !filter.matches(segment.segment_id) {
                    continue;
                }
            }
            if segment.is_ended() {
                continue;
            }
            if budget == 0 {
                break;
            }
            self.process_segment(segment, &mut budget, &mut report)
                .await?;
        }

        info!(
            "run finished: {} files imported, {} failed, {} segments completed",
            report.files_imported, report.files_failed, report.segments_completed
        );
        Ok(report)
    }

    /// Fetch (or reuse) the archive's path listing and parse it into the
    /// segment ledger.
    async fn load_segments(&self, archive: &str) -> Result<Vec<WatSegment>, PipelineError> {
        let paths_file = self.layout.wat_paths_file();
        if !paths_file.exists() {
            info!("downloading path listing for {}", archive);
            self.fetcher
                .download_to(&Fetcher::wat_paths_url(archive), &paths_file)
                .await?;
        }
        let lines = read_gz_lines(&paths_file)?;
        Ok(manifest::parse_wat_paths(lines, archive)?)
    }

    /// Parse every pending file of one segment under the worker pool, then
    /// finalize the segment when nothing is left pending.
    async fn process_segment(
        &self,
        segment: &mut WatSegment,
        budget: &mut usize,
        report: &mut ImportReport,
    ) -> Result<(), PipelineError> {
        segment.mark_started();
        std::fs::create_dir_all(self.layout.segment_link_dir(&segment.segment))?;
        if self.config.save_pages {
            std::fs::create_dir_all(self.layout.segment_page_dir(&segment.segment))?;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_threads));
        let mut workers: JoinSet<(String, Result<ParseOutcome, WorkerError>)> = JoinSet::new();
        let mut already_present: Vec<String> = Vec::new();

        let pending: Vec<WatFile> = segment
            .wat_files
            .iter()
            .filter(|f| f.imported.is_none())
            .cloned()
            .collect();

        for file in pending {
            // A crashed run may have left the finished intermediate behind.
            if self
                .layout
                .link_intermediate(&segment.segment, &file.number)
                .exists()
            {
                already_present.push(file.number);
                continue;
            }
            if *budget == 0 {
                continue;
            }
            *budget -= 1;

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break; // semaphore closed
            };
            let fetcher = self.fetcher.clone();
            let layout = self.layout.clone();
            let filters = Arc::clone(&self.filters);
            let segment_name = segment.segment.clone();
            let save_pages = self.config.save_pages;

            workers.spawn(async move {
                let _permit = permit;
                let number = file.number.clone();
                let result =
                    import_wat_file(fetcher, layout, segment_name, file, filters, save_pages)
                        .await;
                (number, result)
            });
        }

        for number in already_present {
            segment.mark_file_imported(&number);
        }

        let mut fetch_failure: Option<FetchError> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((number, Ok(outcome))) => {
                    segment.mark_file_imported(&number);
                    report.files_imported += 1;
                    report.links_emitted += outcome.links;
                    info!(
                        "segment {} file {}: {} pages, {} links, {} skipped",
                        segment.segment, number, outcome.pages, outcome.links,
                        outcome.records_skipped
                    );
                }
                Ok((number, Err(WorkerError::Fetch(err)))) => {
                    report.files_failed += 1;
                    warn!("segment {} file {}: download failed: {}", segment.segment, number, err);
                    fetch_failure = Some(err);
                }
                Ok((number, Err(err))) => {
                    report.files_failed += 1;
                    warn!(
                        "segment {} file {}: {}; will retry on a later run",
                        segment.segment, number, err
                    );
                }
                Err(join_err) => {
                    report.files_failed += 1;
                    warn!("worker join error: {}", join_err);
                }
            }
        }

        // Exhausted download retries mean the data host is refusing us;
        // abort the run after the pool drains rather than hammering on.
        if let Some(err) = fetch_failure {
            return Err(PipelineError::Fetch(err));
        }

        if segment.pending_files() == 0 && !self.layout.sort_file(segment.segment_id).exists() {
            self.finalize_segment(segment).await?;
            report.segments_completed += 1;
        } else if segment.pending_files() > 0 {
            info!(
                "segment {} partial: {} files still pending",
                segment.segment,
                segment.pending_files()
            );
        }

        Ok(())
    }

    /// Sort the segment's intermediates, compact the sorted stream, and
    /// clean up. Intermediates are deleted only after the sort output is on
    /// disk; the sort output only after the compacted output is.
    async fn finalize_segment(&self, segment: &mut WatSegment) -> Result<(), PipelineError> {
        let segment_id = segment.segment_id;
        let link_dir = self.layout.segment_link_dir(&segment.segment);
        let inputs = DataLayout::list_intermediates(&link_dir)?;
        let sort_file = self.layout.sort_file(segment_id);

        info!(
            "segment {}: sorting {} intermediates",
            segment.segment,
            inputs.len()
        );
        self.run_merge(inputs.clone(), sort_file.clone()).await?;

        for input in &inputs {
            std::fs::remove_file(input)?;
        }
        DataLayout::remove_dir_if_empty(&link_dir)?;

        if self.config.save_pages {
            let page_dir = self.layout.segment_page_dir(&segment.segment);
            let page_inputs = DataLayout::list_intermediates(&page_dir)?;
            if !page_inputs.is_empty() {
                self.run_merge(page_inputs.clone(), self.layout.page_sort_file(segment_id))
                    .await?;
                for input in &page_inputs {
                    std::fs::remove_file(input)?;
                }
            }
            DataLayout::remove_dir_if_empty(&page_dir)?;
        }
        DataLayout::remove_dir_if_empty(&self.layout.segment_tmp_dir(&segment.segment))?;

        let compact_out = self.layout.compact_file(segment_id);
        info!("segment {}: compacting", segment.segment);
        let sort_input = sort_file.clone();
        let compact_target = compact_out.clone();
        let stats = tokio::task::spawn_blocking(move || {
            compact_gzip_file(&sort_input, &compact_target)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;

        std::fs::remove_file(&sort_file)?;
        segment.mark_ended();
        info!(
            "segment {} complete: {} lines in, {} compacted records ({} malformed)",
            segment.segment, stats.lines_read, stats.records_written, stats.malformed_lines
        );
        Ok(())
    }

    async fn run_merge(
        &self,
        inputs: Vec<std::path::PathBuf>,
        output: std::path::PathBuf,
    ) -> Result<(), PipelineError> {
        let sorter = Arc::clone(&self.sorter);
        tokio::task::spawn_blocking(move || sorter.merge(&inputs, &output))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))??;
        Ok(())
    }
}

/// One worker: download the WAT file if needed, parse it to intermediates
/// on a blocking thread, and let the parser delete the download.
async fn import_wat_file(
    fetcher: Fetcher,
    layout: DataLayout,
    segment_name: String,
    file: WatFile,
    filters: Arc<FilterTables>,
    save_pages: bool,
) -> Result<ParseOutcome, WorkerError> {
    let wat_path = layout.wat_download_path(&file.path);
    if !wat_path.exists() {
        fetcher
            .download_to(&Fetcher::data_url(&file.path), &wat_path)
            .await?;
    }

    let link_out = layout.link_intermediate(&segment_name, &file.number);
    let page_out = save_pages.then(|| layout.page_intermediate(&segment_name, &file.number));

    let outcome = tokio::task::spawn_blocking(move || {
        let parser = WatParser::new(filters);
        parser.parse_file(&wat_path, &link_out, page_out.as_deref())
    })
    .await
    .map_err(|_| WorkerError::Panicked)??;

    Ok(outcome)
}

/// Rebuild ledger state from filesystem artifacts.
pub fn reconcile_progress(layout: &DataLayout, segments: &mut [WatSegment]) {
    for segment in segments {
        if layout.sort_file(segment.segment_id).exists()
            || layout.compact_file(segment.segment_id).exists()
        {
            info!("segment {} already imported", segment.segment);
            segment.mark_ended();
            continue;
        }
        let numbers: Vec<String> = segment
            .wat_files
            .iter()
            .filter(|f| f.imported.is_none())
            .filter(|f| layout.link_intermediate(&segment.segment, &f.number).exists())
            .map(|f| f.number.clone())
            .collect();
        for number in numbers {
            segment.mark_file_imported(&number);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    fn make_segment(segment: &str, id: u32, numbers: &[&str]) -> WatSegment {
        WatSegment {
            archive: "CC-MAIN-2024-33".to_string(),
            segment: segment.to_string(),
            segment_id: id,
            wat_files: numbers
                .iter()
                .map(|n| WatFile {
                    number: n.to_string(),
                    path: format!("crawl-data/a/segments/{}/wat/CC-x-{}.warc.wat.gz", segment, n),
                    imported: None,
                })
                .collect(),
            import_started: None,
            import_ended: None,
        }
    }

    fn touch_gz(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        enc.finish().unwrap();
    }

    #[test]
    fn reconcile_marks_existing_intermediates_imported() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        let mut segments = vec![make_segment("1722640000000.0", 0, &["00000", "00001"])];

        touch_gz(&layout.link_intermediate("1722640000000.0", "00000"));
        reconcile_progress(&layout, &mut segments);

        assert_eq!(segments[0].pending_files(), 1);
        assert!(!segments[0].is_ended());
    }

    #[test]
    fn reconcile_marks_sorted_segments_ended() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        let mut segments = vec![
            make_segment("1722640000000.0", 0, &["00000"]),
            make_segment("1722640000001.1", 1, &["00000"]),
        ];

        touch_gz(&layout.sort_file(0));
        reconcile_progress(&layout, &mut segments);

        assert!(segments[0].is_ended());
        assert!(!segments[1].is_ended());
    }

    #[test]
    fn reconcile_marks_compacted_segments_ended() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        let mut segments = vec![make_segment("1722640000000.0", 0, &["00000"])];

        touch_gz(&layout.compact_file(0));
        reconcile_progress(&layout, &mut segments);

        assert!(segments[0].is_ended());
    }

    #[test]
    fn read_gz_lines_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("lines.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        writeln!(enc, "first").unwrap();
        writeln!(enc, "second").unwrap();
        enc.finish().unwrap();

        assert_eq!(read_gz_lines(&path).unwrap(), ["first", "second"]);
    }
}
