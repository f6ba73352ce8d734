use anyhow::{Context, Result};
use linkdex::pipeline::compact_gzip_file;
use std::path::PathBuf;

/// Compact an explicit sorted stream outside the segment pipeline.
pub async fn run_compacting(sorted_input: PathBuf, compacted_output: PathBuf) -> Result<()> {
    if !sorted_input.is_file() {
        anyhow::bail!("sorted input not found: {}", sorted_input.display());
    }
    if let Some(parent) = compacted_output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }

    let stats = tokio::task::spawn_blocking(move || {
        compact_gzip_file(&sorted_input, &compacted_output)
    })
    .await
    .context("compaction task failed")??;

    println!("Compaction Complete");
    println!("===================");
    println!("Lines read:      {}", stats.lines_read);
    println!("Records written: {}", stats.records_written);
    println!("Malformed lines: {}", stats.malformed_lines);

    Ok(())
}
