//! External sort of a segment's intermediates.
//!
//! Per-segment totals routinely exceed main memory, and reimplementing a
//! multi-way external merge is not the interesting part of this system. The
//! driver composes battle-tested tools instead:
//! `gzip -cd … | LC_ALL=C sort -u -S <buf> | gzip`. `LC_ALL=C` pins bytewise
//! lexicographic order, `-u` collapses exact duplicates. The destination is
//! written through a `.tmp` sibling and renamed, so failure leaves nothing
//! under the final name.

use crate::segment::tmp_sibling;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// In-memory buffer handed to sort(1), 1 GiB.
const DEFAULT_BUFFER_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SortError {
    #[error("failed to run sort pipeline: {0}")]
    Spawn(std::io::Error),
    #[error("sort pipeline exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Merge gzipped line files into one sorted, deduplicated gzipped output.
pub trait SortedMerge: Send + Sync {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), SortError>;
}

/// Production merge via the OS sort utility.
#[derive(Debug, Clone)]
pub struct SystemSort {
    /// sort(1) in-memory buffer in bytes
    pub buffer_bytes: u64,
    /// Compress sort's on-disk temp files; for disk-constrained hosts
    pub compress_temp: bool,
}

impl Default for SystemSort {
    fn default() -> Self {
        Self {
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            compress_temp: false,
        }
    }
}

impl SystemSort {
    fn pipeline_command(&self, inputs: &[PathBuf], tmp_output: &Path) -> String {
        let inputs = inputs
            .iter()
            .map(|p| shell_quote(&p.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");
        let buffer_mib = (self.buffer_bytes / (1024 * 1024)).max(1);
        let compress = if self.compress_temp {
            " --compress-program=gzip"
        } else {
            ""
        };
        format!(
            "set -o pipefail; gzip -cd {} | LC_ALL=C sort -u -S {}M{} | gzip > {}",
            inputs,
            buffer_mib,
            compress,
            shell_quote(&tmp_output.to_string_lossy())
        )
    }
}

impl SortedMerge for SystemSort {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), SortError> {
        let tmp = tmp_sibling(output);

        // Nothing to merge still yields a valid (empty) sorted stream.
        if inputs.is_empty() {
            let file = std::fs::File::create(&tmp)?;
            flate2::write::GzEncoder::new(file, flate2::Compression::default()).finish()?;
            std::fs::rename(&tmp, output)?;
            return Ok(());
        }

        let command = self.pipeline_command(inputs, &tmp);
        tracing::debug!("running sort pipeline: {}", command);

        let status = Command::new("bash")
            .arg("-c")
            .arg(&command)
            .status()
            .map_err(SortError::Spawn)?;

        if !status.success() {
            let _ = std::fs::remove_file(&tmp);
            return Err(SortError::Failed(status));
        }

        std::fs::rename(&tmp, output)?;
        Ok(())
    }
}

/// Single-quote a path for the shell, escaping embedded quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};

    fn write_gz_lines(path: &Path, lines: &[&str]) {
        let file = std::fs::File::create(path).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        for line in lines {
            writeln!(enc, "{}", line).unwrap();
        }
        enc.finish().unwrap();
    }

    fn read_gz_lines(path: &Path) -> Vec<String> {
        let mut content = String::new();
        GzDecoder::new(std::fs::File::open(path).unwrap())
            .read_to_string(&mut content)
            .unwrap();
        content.lines().map(str::to_string).collect()
    }

    #[test]
    fn quotes_paths_for_the_shell() {
        assert_eq!(shell_quote("/plain/path.gz"), "'/plain/path.gz'");
        assert_eq!(shell_quote("with space.gz"), "'with space.gz'");
        assert_eq!(shell_quote("odd'name"), r"'odd'\''name'");
    }

    #[test]
    fn pipeline_command_shape() {
        let sort = SystemSort {
            buffer_bytes: 512 * 1024 * 1024,
            compress_temp: true,
        };
        let cmd = sort.pipeline_command(
            &[PathBuf::from("/a/1.txt.gz"), PathBuf::from("/a/2.txt.gz")],
            Path::new("/out/sort_1.txt.gz.tmp"),
        );
        assert!(cmd.starts_with("set -o pipefail; gzip -cd '/a/1.txt.gz' '/a/2.txt.gz'"));
        assert!(cmd.contains("LC_ALL=C sort -u -S 512M --compress-program=gzip"));
        assert!(cmd.ends_with("| gzip > '/out/sort_1.txt.gz.tmp'"));
    }

    #[test]
    fn merges_sorts_and_dedups() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("00001.txt.gz");
        let b = tmp.path().join("00002.txt.gz");
        let out = tmp.path().join("sort_0.txt.gz");

        write_gz_lines(&a, &["z.com|x", "a.com|1", "m.com|5"]);
        write_gz_lines(&b, &["a.com|1", "b.com|2"]);

        SystemSort::default()
            .merge(&[a, b], &out)
            .expect("system sort available");

        let lines = read_gz_lines(&out);
        assert_eq!(lines, ["a.com|1", "b.com|2", "m.com|5", "z.com|x"]);
        assert!(!tmp_sibling(&out).exists());
    }

    #[test]
    fn empty_input_list_yields_empty_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("sort_1.txt.gz");
        SystemSort::default().merge(&[], &out).unwrap();
        assert!(out.exists());
        assert!(read_gz_lines(&out).is_empty());
    }

    #[test]
    fn missing_input_leaves_no_output() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("sort_2.txt.gz");
        let missing = tmp.path().join("nope.txt.gz");
        let result = SystemSort::default().merge(&[missing], &out);
        assert!(result.is_err());
        assert!(!out.exists());
        assert!(!tmp_sibling(&out).exists());
    }
}
