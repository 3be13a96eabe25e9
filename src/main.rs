//! idcrawl main entry point
//!
//! This is the command-line interface for the idcrawl ID-space crawler.

use anyhow::{Context, Result};
use clap::Parser;
use idcrawl::config::{load_config_with_hash, Config};
use idcrawl::crawler::{run_crawl, StopReason};
use idcrawl::output::{load_statistics, print_statistics, YearWindow};
use idcrawl::storage::{open_storage, Checkpoint, Storage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// idcrawl: A resumable crawler for sites that number their pages
///
/// idcrawl probes a URL template with increasing integer IDs, extracts one
/// record per page, and stores the records together with a checkpoint so an
/// interrupted crawl picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "idcrawl")]
#[command(version)]
#[command(about = "A resumable ID-space crawler", long_about = None)]
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

    /// Validate config and show where the crawl would start without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// First publication year counted in the yearly statistics
    #[arg(long, requires = "stats")]
    from_year: Option<i32>,

    /// Last publication year counted in the yearly statistics
    #[arg(long, requires = "stats")]
    to_year: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        let years = YearWindow {
            from: cli.from_year,
            to: cli.to_year,
        };
        handle_stats(&config, years)
    } else {
        handle_crawl(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("idcrawl=info,warn"),
            1 => EnvFilter::new("idcrawl=debug,info"),
            2 => EnvFilter::new("idcrawl=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows where the crawl would start
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== idcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Miss threshold: {}", config.crawler.miss_threshold);
    println!("  Flush batch size: {}", config.crawler.flush_batch_size);

    println!("\nSite:");
    println!("  Source: {}", config.site.source);
    println!("  URL template: {}", config.site.url_template);
    println!("  Categories ({}): {}", config.site.categories.len(), config.site.categories.join(", "));

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let checkpoint = storage
        .read_checkpoint(&config.site.source)
        .context("failed to read checkpoint")?;

    println!("\nCheckpoint:");
    match &checkpoint {
        Some(cp) => {
            println!("  Last attempted ID: {}", cp.last_id);
            println!("  Successes recorded: {}", cp.total_success_count);
        }
        None => println!("  None (fresh crawl)"),
    }

    let next_id = checkpoint
        .unwrap_or_else(|| Checkpoint::new(config.site.source.clone()))
        .next_id();

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start probing at ID {}: {}",
        next_id,
        config.site.item_url(next_id)
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, years: YearWindow) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let stats = load_statistics(&storage, &config.site.source, years)
        .context("failed to load statistics")?;

    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<()> {
    tracing::info!(
        "Crawling '{}' from template {}",
        config.site.source,
        config.site.url_template
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Interrupt received, flushing and stopping");
    };

    let report = run_crawl(config, shutdown).await.context("crawl failed")?;

    match report.stop_reason {
        StopReason::MissThreshold => tracing::info!("Crawl completed successfully"),
        StopReason::Interrupted => tracing::info!("Crawl interrupted; rerun to resume"),
    }
    tracing::info!(
        "Fetched {}, stored {}, skipped {}, misses {}, no content {}, failures {}",
        report.counts.fetched,
        report.counts.stored,
        report.counts.skipped,
        report.counts.misses,
        report.counts.no_content,
        report.counts.transient_failures
    );
    tracing::info!(
        "Checkpoint: last ID {}, {} records total",
        report.checkpoint.last_id,
        report.checkpoint.total_success_count
    );

    Ok(())
}
