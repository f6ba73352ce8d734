//! The three-stage per-segment pipeline: parse → external sort → compact.

mod compact;
mod coordinator;
mod sort;

pub use compact::{
    compact_gzip_file, compact_stream, CompactError, CompactStats, CompactedLink,
};
pub use coordinator::{reconcile_progress, ImportCoordinator, ImportReport, PipelineError};
pub use sort::{SortError, SortedMerge, SystemSort};
