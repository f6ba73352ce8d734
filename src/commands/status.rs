use anyhow::{Context, Result};
use linkdex::config::ImportConfig;
use linkdex::pipeline::reconcile_progress;
use linkdex::segment::manifest::{parse_wat_paths, read_gz_lines};
use linkdex::segment::{is_valid_archive_name, select_segment_to_import, DataLayout};

/// Report per-segment progress for an archive, derived purely from the
/// filesystem artifacts in the data directory.
pub async fn run_status(archive: String, json: bool) -> Result<()> {
    if !is_valid_archive_name(&archive) {
        anyhow::bail!(
            "invalid archive name {:?}: expected the CC-MAIN-YYYY-WW form",
            archive
        );
    }

    let config = ImportConfig::resolve(None, None);
    let layout = DataLayout::new(&config.data_dir);

    let paths_file = layout.wat_paths_file();
    if !paths_file.exists() {
        anyhow::bail!(
            "no cached path listing at {}; run an import first",
            paths_file.display()
        );
    }

    let lines = read_gz_lines(&paths_file)
        .with_context(|| format!("cannot read {}", paths_file.display()))?;
    let mut segments = parse_wat_paths(lines, &archive)?;
    reconcile_progress(&layout, &mut segments);

    if json {
        println!("{}", serde_json::to_string_pretty(&segments)?);
        return Ok(());
    }

    println!("Archive {} in {}", archive, config.data_dir.display());
    println!("{:<6} {:<22} {:>9} {:>8}  {}", "id", "segment", "imported", "total", "state");
    let mut files_done = 0usize;
    let mut files_total = 0usize;
    for segment in &segments {
        let total = segment.wat_files.len();
        let imported = total - segment.pending_files();
        files_done += imported;
        files_total += total;
        println!(
            "{:<6} {:<22} {:>9} {:>8}  {}",
            segment.segment_id,
            segment.segment,
            imported,
            total,
            segment_state(&layout, segment)
        );
    }

    let done = segments.iter().filter(|s| s.is_ended()).count();
    println!(
        "\n{}/{} segments done, {}/{} files imported",
        done,
        segments.len(),
        files_done,
        files_total
    );
    match select_segment_to_import(&segments) {
        Some(next) => println!("next segment to import: {} ({})", next.segment_id, next.segment),
        None => println!("nothing left to import"),
    }

    Ok(())
}

fn segment_state(layout: &DataLayout, segment: &linkdex::segment::WatSegment) -> &'static str {
    if layout.compact_file(segment.segment_id).exists() {
        "compacted"
    } else if layout.sort_file(segment.segment_id).exists() {
        "sorted"
    } else if segment.pending_files() == 0 {
        "parsed"
    } else if segment.pending_files() < segment.wat_files.len() {
        "partial"
    } else {
        "pending"
    }
}
