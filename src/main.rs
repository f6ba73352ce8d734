//! Linkdex CLI: Common Crawl backlink importer.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use linkdex::config::{init_logging, LogLevel, LoggingConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "linkdex")]
#[command(about = "Backlink extraction pipeline over the Common Crawl WAT corpus")]
#[command(version)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an archive segment by segment
    Import {
        /// Archive name, e.g. CC-MAIN-2024-33
        archive: String,

        /// WAT file budget for this run (falls back to GLOBALLINKS_MAXWATFILES)
        max_wat_files: Option<usize>,

        /// Worker pool size (falls back to GLOBALLINKS_MAXTHREADS)
        max_threads: Option<usize>,

        /// Segment ids to process: a comma list (2,3,5) or a range (0-10);
        /// omit to process all not-yet-ended segments
        segments: Option<String>,

        /// Also emit per-WAT page intermediates
        #[arg(long)]
        save_pages: bool,
    },

    /// Show per-segment progress derived from the data directory
    Status {
        /// Archive name, e.g. CC-MAIN-2024-33
        archive: String,

        /// Emit the full segment ledger as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compact a sorted link stream into the 16-field output form
    Compacting {
        /// Gzipped, lexicographically sorted link stream
        sorted_input: PathBuf,

        /// Destination for the gzipped compacted stream
        compacted_output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    init_logging(&LoggingConfig {
        level,
        ..LoggingConfig::default()
    });

    match cli.command {
        Commands::Import {
            archive,
            max_wat_files,
            max_threads,
            segments,
            save_pages,
        } => {
            commands::run_import(archive, max_wat_files, max_threads, segments, save_pages)
                .await
        }
        Commands::Status { archive, json } => commands::run_status(archive, json).await,
        Commands::Compacting {
            sorted_input,
            compacted_output,
        } => commands::run_compacting(sorted_input, compacted_output).await,
    }
}
