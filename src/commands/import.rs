use anyhow::{Context, Result};
use linkdex::config::{Config, ImportConfig};
use linkdex::pipeline::ImportCoordinator;
use linkdex::segment::{is_valid_archive_name, SegmentFilter};
use tracing::info;

/// Run the importer for one archive.
pub async fn run_import(
    archive: String,
    max_wat_files: Option<usize>,
    max_threads: Option<usize>,
    segments: Option<String>,
    save_pages: bool,
) -> Result<()> {
    if !is_valid_archive_name(&archive) {
        anyhow::bail!(
            "invalid archive name {:?}: expected the CC-MAIN-YYYY-WW form",
            archive
        );
    }

    let filter = segments
        .as_deref()
        .map(str::parse::<SegmentFilter>)
        .transpose()
        .context("invalid segment spec (expected e.g. \"2,3,5\" or \"0-10\")")?;

    let mut import = ImportConfig::resolve(max_wat_files, max_threads);
    import.save_pages = save_pages;
    let config = Config {
        import,
        ..Config::default()
    };
    config.validate()?;

    info!(
        "importing {} into {}",
        archive,
        config.import.data_dir.display()
    );

    let coordinator = ImportCoordinator::new(config.import)?;
    let report = coordinator
        .run(&archive, filter.as_ref())
        .await
        .context("import run failed")?;

    println!("\nImport Run Complete");
    println!("===================");
    println!("Files imported:     {}", report.files_imported);
    println!("Files failed:       {}", report.files_failed);
    println!("Links emitted:      {}", report.links_emitted);
    println!("Segments completed: {}", report.segments_completed);

    Ok(())
}
