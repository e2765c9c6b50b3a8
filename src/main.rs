//! Novel-Harvest main entry point
//!
//! This is the command-line interface for the Novel-Harvest chapter acquisition engine.

use anyhow::{bail, Context};
use clap::Parser;
use novel_harvest::config::{load_config_with_hash, Config};
use novel_harvest::output::print_report;
use novel_harvest::{load_book, Book, HarvestError, Pipeline, SourceRegistry};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Novel-Harvest: a resumable chapter acquisition engine
///
/// Novel-Harvest fetches every chapter listed in a book manifest, caches the
/// chapters on disk, localizes embedded images and downloads a cover. Runs
/// can be interrupted and resumed at any time.
#[derive(Parser, Debug)]
#[command(name = "novel-harvest")]
#[command(version)]
#[command(about = "A resumable chapter acquisition engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Path to TOML book manifest
    #[arg(value_name = "BOOK")]
    book: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv); also hides progress bars
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and book, show the plan and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.verbose > 0 || debug_mode_from_env() {
        config.output.debug_mode = true;
    }

    let book = load_book(&cli.book)
        .with_context(|| format!("Failed to load book manifest {}", cli.book.display()))?;

    let registry = SourceRegistry::from_config(&config)?;

    if cli.dry_run {
        handle_dry_run(&config, &book, &registry);
        return Ok(());
    }

    let source = registry
        .resolve(&book.novel_url)
        .ok_or_else(|| HarvestError::UnknownSource {
            url: book.novel_url.clone(),
        })?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let pipeline = Pipeline::new(&config, source, cancel).with_config_hash(config_hash);
    match pipeline.run(&book).await {
        Ok(outcome) => {
            print_report(&outcome.report);
            if outcome.report.failure_count() > 0 {
                bail!(
                    "{} resources could not be fetched; run again to retry them",
                    outcome.report.failure_count()
                );
            }
            Ok(())
        }
        Err(HarvestError::Cancelled) => {
            tracing::warn!("Run cancelled; saved chapters will be reused next time");
            Err(HarvestError::Cancelled.into())
        }
        Err(e) => Err(e).context("Run failed"),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("novel_harvest=info,warn"),
            1 => EnvFilter::new("novel_harvest=debug,info"),
            2 => EnvFilter::new("novel_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn debug_mode_from_env() -> bool {
    std::env::var("debug_mode")
        .map(|value| value.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

/// Cancels the run on the first Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
            Err(e) => tracing::error!("Cannot listen for Ctrl-C: {}", e),
        }
    });
}

/// Handles the --dry-run mode: shows what a run would do
fn handle_dry_run(config: &Config, book: &Book, registry: &SourceRegistry) {
    println!("=== Novel-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!(
        "  Backoff: {}ms + {}ms per attempt",
        config.crawler.backoff_base_ms, config.crawler.backoff_step_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Path: {}", config.output.output_path.display());
    println!("  Pack by volume: {}", config.output.pack_by_volume);
    println!("  Add source URL: {}", config.output.add_source_url);

    println!("\nSources ({}):", registry.len());
    for base in registry.base_urls() {
        println!("  - {}", base);
    }

    println!("\nBook: {}", book.title);
    if let Some(author) = &book.author {
        println!("  Author: {}", author);
    }
    println!("  Novel URL: {}", book.novel_url);
    println!(
        "  Chapters: {} in {} volumes",
        book.chapters.len(),
        book.volume_count()
    );

    match registry.resolve(&book.novel_url) {
        Some(_) => println!("\n✓ Configuration and book are valid"),
        None => println!("\n✗ No configured source handles {}", book.novel_url),
    }
}
