//! Import run configuration resolved from CLI arguments and environment

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the worker pool size.
pub const ENV_MAX_THREADS: &str = "GLOBALLINKS_MAXTHREADS";
/// Environment variable naming the per-run WAT file budget.
pub const ENV_MAX_WAT_FILES: &str = "GLOBALLINKS_MAXWATFILES";
/// Environment variable naming the data root directory.
pub const ENV_DATA_PATH: &str = "GLOBALLINKS_DATAPATH";

/// Worker pool bounds. Every worker holds a full WAT file's dedup maps in
/// memory (~1.5 GiB), so the cap stays low.
pub const MIN_THREADS: usize = 1;
pub const MAX_THREADS: usize = 16;

/// Per-run WAT file budget bounds.
pub const MIN_WAT_FILES: usize = 1;
pub const MAX_WAT_FILES: usize = 100_000;

const DEFAULT_THREADS: usize = 1;
const DEFAULT_WAT_FILES: usize = 1;
const DEFAULT_DATA_PATH: &str = "data";
const DEFAULT_DOWNLOAD_RETRIES: u32 = 3;

/// Configuration for one import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Worker pool size (1..=16)
    pub max_threads: usize,
    /// Maximum WAT files processed in this run (1..=100000)
    pub max_wat_files: usize,
    /// Data root directory
    pub data_dir: PathBuf,
    /// Emit per-WAT page intermediates alongside link intermediates
    pub save_pages: bool,
    /// Download attempts per file before the run aborts
    pub download_retries: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_THREADS,
            max_wat_files: DEFAULT_WAT_FILES,
            data_dir: PathBuf::from(DEFAULT_DATA_PATH),
            save_pages: false,
            download_retries: DEFAULT_DOWNLOAD_RETRIES,
        }
    }
}

impl ImportConfig {
    /// Resolve the configuration: a CLI positional beats the environment
    /// variable, which beats the default. Invalid environment values log a
    /// warning and fall back to the default; invalid CLI values are clamped
    /// into range with a warning, since the operator typed them on purpose.
    pub fn resolve(
        cli_max_wat_files: Option<usize>,
        cli_max_threads: Option<usize>,
    ) -> Self {
        let max_threads = match cli_max_threads {
            Some(n) => clamp_with_warning("max threads", n, MIN_THREADS, MAX_THREADS),
            None => env_bounded(ENV_MAX_THREADS, DEFAULT_THREADS, MIN_THREADS, MAX_THREADS),
        };
        let max_wat_files = match cli_max_wat_files {
            Some(n) => clamp_with_warning("max wat files", n, MIN_WAT_FILES, MAX_WAT_FILES),
            None => env_bounded(ENV_MAX_WAT_FILES, DEFAULT_WAT_FILES, MIN_WAT_FILES, MAX_WAT_FILES),
        };
        let data_dir = std::env::var(ENV_DATA_PATH)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        Self {
            max_threads,
            max_wat_files,
            data_dir,
            ..Self::default()
        }
    }
}

/// Read a bounded numeric environment variable, warning and defaulting on
/// anything unparseable or out of range.
fn env_bounded(var: &str, default: usize, min: usize, max: usize) -> usize {
    let raw = match std::env::var(var) {
        Ok(v) => v,
        Err(_) => return default,
    };
    match parse_bounded(&raw, min, max) {
        Some(n) => n,
        None => {
            tracing::warn!(
                "{} must be a number between {} and {}, got {:?}; using default {}",
                var,
                min,
                max,
                raw,
                default
            );
            default
        }
    }
}

/// Parse a decimal value and check it against an inclusive range.
fn parse_bounded(raw: &str, min: usize, max: usize) -> Option<usize> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (min..=max).contains(n))
}

fn clamp_with_warning(what: &str, value: usize, min: usize, max: usize) -> usize {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(
            "{} {} outside {}..={}, using {}",
            what,
            value,
            min,
            max,
            clamped
        );
    }
    clamped
}
