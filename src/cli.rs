//! Command-line interface module for dirsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Source validation and destination setup
//! - Configuration loading
//! - Running the walk and reporting its summary

use crate::config::{ConfigError, SortConfig};
use crate::dir_walker::{Summary, WalkContext, WalkError, walk_and_sort};
use crate::output::OutputFormatter;
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info};

/// Sort a directory tree into category folders by file extension.
#[derive(Debug, Clone, Parser)]
#[command(name = "dirsort", version, about, long_about = None)]
pub struct Cli {
    /// Path to the directory to sort
    pub source: PathBuf,

    /// Destination root for the category folders
    #[arg(default_value = "sorted_files")]
    pub output: PathBuf,

    /// TOML file with filter rules and extra extension mappings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show where files would go without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of files transferred at once (0 = unbounded)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the final summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Errors that stop a run before or at the top of the walk.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Path {} does not exist.", .0.display())]
    SourceNotFound(PathBuf),
    #[error("Path {} is not a directory.", .0.display())]
    SourceNotDirectory(PathBuf),
    #[error("Failed to create destination {}: {source}", path.display())]
    DestinationCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Walk(#[from] WalkError),
}

/// Runs one sort with the parsed arguments.
///
/// Validates the source, creates the destination, walks the tree once and
/// logs the summary. Per-file and per-folder problems do not make this fail;
/// they are listed in the returned [`Summary`].
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use dirsort::cli::{Cli, run_cli};
///
/// # async fn demo() {
/// let cli = Cli::parse_from(["dirsort", "/path/to/downloads", "/path/to/sorted"]);
/// match run_cli(&cli).await {
///     Ok(summary) => println!("{}", summary),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// # }
/// ```
pub async fn run_cli(cli: &Cli) -> Result<Summary, CliError> {
    let source = &cli.source;
    if !fs::try_exists(source).await.unwrap_or(false) {
        return Err(CliError::SourceNotFound(source.clone()));
    }
    if !fs::metadata(source)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
    {
        return Err(CliError::SourceNotDirectory(source.clone()));
    }

    let config = SortConfig::load(cli.config.as_deref())?;
    let filters = config.compile_filters()?;
    let max_transfers = cli
        .jobs
        .unwrap_or(config.transfer.max_concurrent_transfers);

    if !cli.dry_run {
        fs::create_dir_all(&cli.output)
            .await
            .map_err(|source| CliError::DestinationCreate {
                path: cli.output.clone(),
                source,
            })?;
    }

    let source_abs = absolute(source).await;
    let output_abs = absolute(&cli.output).await;

    let ctx = WalkContext::new(config.build_mapper())
        .with_filters(filters)
        .with_max_concurrent_transfers(max_transfers)
        .with_dry_run(cli.dry_run)
        .with_source_root(&source_abs);

    let started_at = chrono::Utc::now();
    let summary = walk_and_sort(&source_abs, &output_abs, &ctx).await?;
    let elapsed = chrono::Utc::now() - started_at;

    info!("{}", summary);
    info!("Source: {}", source_abs.display());
    info!("Destination: {}", output_abs.display());
    info!(
        "Processed {} files ({} failures) in {} ms",
        summary.files_handled(),
        summary.failures.len(),
        elapsed.num_milliseconds()
    );

    Ok(summary)
}

/// Runs the CLI and prints the report; errors are logged, not returned.
///
/// A missing source is reported and the run stops without side effects.
pub async fn run_and_report(cli: &Cli) {
    match run_cli(cli).await {
        Ok(summary) => {
            if cli.json {
                if let Err(e) = OutputFormatter::json(&summary) {
                    error!("Failed to render summary: {}", e);
                }
            } else {
                OutputFormatter::summary_table(&summary);
            }
        }
        // The walk logs its own errors where they happen.
        Err(CliError::Walk(_)) => {}
        Err(e) => error!("{}", e),
    }
}

async fn absolute(path: &Path) -> PathBuf {
    match fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}
