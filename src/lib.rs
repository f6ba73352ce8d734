//! Linkdex: backlink extraction pipeline over the Common Crawl WAT corpus.
//!
//! The crate ingests monthly crawl archives segment by segment and produces
//! a sorted, deduplicated, compacted backlink dataset, featuring:
//! - Streaming WAT parsing with in-file dedup and quality filtering
//! - URL normalization against the Public Suffix List
//! - Bounded-concurrency segment coordination with resume-after-crash
//! - External merge-sort and linear compaction of the per-segment stream

pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod segment;
pub mod url;
pub mod wat;

pub use config::Config;
