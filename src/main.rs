//! Shelfscan main entry point
//!
//! This is the command-line interface for the Shelfscan catalog scraper.

use anyhow::Context;
use clap::Parser;
use shelfscan::config::{load_config_with_hash, Config};
use shelfscan::crawler::{Coordinator, RunOutcome};
use shelfscan::output::{print_dataset_summary, print_statistics, summarize_dataset};
use shelfscan::Dataset;
use shelfscan::url::{listing_page_url, parse_root};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status reported when a run is cancelled
const EXIT_CANCELLED: u8 = 130;

/// Shelfscan: a two-stage book catalog scraper
///
/// Shelfscan walks a paged product listing, extracts every product's detail
/// page into a typed record and writes the result as a CSV dataset.
#[derive(Parser, Debug)]
#[command(name = "shelfscan")]
#[command(version)]
#[command(about = "A two-stage book catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Scrape the URLs listed in the seed file instead of paginating the catalog
    #[arg(long, conflicts_with_all = ["dry_run", "inspect"])]
    from_seed: bool,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with_all = ["from_seed", "inspect"])]
    dry_run: bool,

    /// Summarize the existing dataset and exit
    #[arg(long, conflicts_with_all = ["from_seed", "dry_run"])]
    inspect: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)?;
        Ok(ExitCode::SUCCESS)
    } else if cli.inspect {
        handle_inspect(&config)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_scrape(config, cli.from_seed).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelfscan=info,warn"),
            1 => EnvFilter::new("shelfscan=debug,info"),
            2 => EnvFilter::new("shelfscan=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Shelfscan Dry Run ===\n");

    let root = parse_root(&config.site.base_url)?;
    println!("Site:");
    println!("  Base URL: {}", root);
    println!(
        "  First listing page: {}",
        listing_page_url(&root, &config.site.listing_path, 1)?
    );
    println!("  Asset root: {}", config.site.asset_root());

    println!("\nFetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!(
        "  Retries: {} (base delay {}ms)",
        config.fetch.max_retries, config.fetch.retry_delay_ms
    );

    println!("\nCrawler:");
    println!("  Max in flight: {}", config.crawler.max_in_flight);
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: until exhausted"),
    }
    if let Some(deadline) = config.crawler.deadline_secs {
        println!("  Deadline: {}s", deadline);
    }
    println!("  Flush on cancel: {}", config.crawler.flush_on_cancel);

    println!("\nOutput:");
    println!("  Dataset: {}", config.output.dataset_path);
    if let Some(seed) = &config.output.seed_path {
        println!("  Seed file: {}", seed);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --inspect mode: loads the persisted dataset and summarizes it
fn handle_inspect(config: &Config) -> anyhow::Result<()> {
    let path = Path::new(&config.output.dataset_path);
    let dataset = Dataset::load(path).with_context(|| format!("inspecting {}", path.display()))?;

    println!("Dataset: {}\n", path.display());
    print_dataset_summary(&summarize_dataset(&dataset));
    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(config: Config, from_seed: bool) -> anyhow::Result<ExitCode> {
    let mut coordinator = if from_seed {
        tracing::info!("Starting seeded scrape");
        Coordinator::from_seed(config)?
    } else {
        tracing::info!("Starting catalog scrape at {}", config.site.base_url);
        Coordinator::new(config)?
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let outcome = coordinator
        .run_until_cancelled(cancel)
        .await
        .context("scrape failed")?;
    print_statistics(outcome.stats());

    match outcome {
        RunOutcome::Completed { dataset, .. } => {
            tracing::info!("Dataset of {} records written", dataset.len());
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Cancelled { flushed, .. } => {
            if flushed {
                tracing::warn!("Run cancelled; partial dataset written");
            } else {
                tracing::warn!("Run cancelled; no dataset written");
            }
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
    }
}
