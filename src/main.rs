use anyhow::{Context, Result, bail};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use validate_manifests::cli::Cli;
use validate_manifests::config::{Config, ConfigManager};
use validate_manifests::file_discovery::FileDiscovery;
use validate_manifests::output::{reporter_for, use_color};
use validate_manifests::schema_loader::ReferenceFetcher;
use validate_manifests::validator::{RunSummary, ValidationEngine};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(summary) if summary.success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.output.verbosity().filter_directive()));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run() -> Result<RunSummary> {
    let cli = Cli::parse_args();
    if let Err(message) = cli.validate() {
        bail!(message);
    }

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    init_logging(&config);

    let fetcher = ReferenceFetcher::from_config(&config)?;
    if let Some(disk_cache) = fetcher.disk_cache() {
        match disk_cache.cleanup_expired().await {
            Ok(stats) if stats.removed_entries > 0 => {
                debug!(removed = stats.removed_entries, "expired schemas removed from disk cache")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "disk cache cleanup failed"),
        }
    }

    let config = Arc::new(config);
    let engine = ValidationEngine::new(Arc::clone(&config), Arc::new(fetcher));
    let mut reporter = reporter_for(
        config.output.format,
        Box::new(io::stdout()),
        use_color(config.output.force_color),
    );

    let summary = if cli.wants_stdin() {
        if atty::is(atty::Stream::Stdin) {
            bail!(
                "You must pass at least one file as an argument, or at least one directory to the directories flag"
            );
        }

        let mut input = Vec::new();
        io::stdin()
            .read_to_end(&mut input)
            .context("Failed to read stdin")?;
        engine
            .validate_input(&input, &config.validation.file_name, reporter.as_mut())
            .await?
    } else {
        let files = collect_files(&cli, &config).await?;
        engine.validate_files(files, reporter.as_mut()).await?
    };

    for e in summary.errors.errors() {
        error!("{}", e);
    }
    info!(
        documents = summary.documents,
        valid = summary.valid,
        invalid = summary.invalid,
        skipped = summary.skipped,
        errors = summary.errors.len(),
        schemas = summary.cache.entries,
        "validation finished"
    );

    Ok(summary)
}

/// Explicit file arguments followed by everything found under `--directories`
async fn collect_files(cli: &Cli, config: &Config) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = cli
        .files
        .iter()
        .filter(|path| path.as_os_str() != "-")
        .cloned()
        .collect();

    if !cli.directories.is_empty() {
        let discovery = FileDiscovery::from_config(&config.files)?;
        files.extend(discovery.discover(&cli.directories).await?);
    }

    Ok(files)
}
