//! Listing Harvester main entry point
//!
//! This is the command-line interface for the listing harvester.

use anyhow::Context;
use clap::Parser;
use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::crawler::crawl;
use listing_harvester::output::{format_summary, load_statistics, print_statistics};
use listing_harvester::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Listing Harvester: a bounded-concurrency harvester for paginated listings
///
/// Walks a paginated listing page by page, enriches every entity with its
/// detail page and stores each entity once by name.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version)]
#[command(about = "Harvests a paginated listing into SQLite", long_about = None)]
struct Cli {
    /// Path to TOML configuration file; it must exist and define [site] landing-url and listing-url
    #[arg(short, long, value_name = "PATH", default_value = "harvester.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(ExitCode::SUCCESS)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_crawl(config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated plan
fn handle_dry_run(config: &Config) {
    println!("=== Listing Harvester Dry Run ===\n");

    println!("Site:");
    println!("  Landing page: {}", config.site.landing_url);
    println!("  Listing endpoint: {}", config.site.listing_url);
    println!(
        "  Form fields: {} (token), {} (offset)",
        config.site.token_field, config.site.offset_field
    );
    println!("  Payload field: {}", config.site.payload_field);

    println!("\nCrawler:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Page stride: {}", config.crawler.page_stride);
    println!("  Max offset: {}", config.crawler.max_offset);
    println!("  Detail lookups per page: {}", config.enrich_concurrency());

    println!("\nDatabase:");
    println!("  Path: {}", config.database.path);
    println!("  Table: {}", config.database.table);
    println!("  Pool size: {}", config.pool_size());

    println!("\nSelectors:");
    println!("  Token: {}", config.selectors.token);
    println!("  Item: {}", config.selectors.item);
    println!("  Detail link: {}", config.selectors.detail_link);
    println!("  Website link: {}", config.selectors.website_link);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would request at most {} listing pages",
        config.crawler.max_offset / config.crawler.page_stride.max(1) + 1
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = Path::new(&config.database.path);
    println!("Database: {}\n", path.display());

    if !path.exists() {
        println!("No database found; nothing harvested yet");
        return Ok(());
    }

    let storage = SqliteStorage::new(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    let stats = load_statistics(&storage, &config.database.table)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<ExitCode> {
    tracing::info!(
        "Harvesting {} with concurrency {}",
        config.site.listing_url,
        config.crawler.concurrency
    );

    let summary = crawl(config, config_hash).await?;
    print!("{}", format_summary(&summary));

    if summary.is_success() {
        tracing::info!("Harvest completed: {}", summary.stop_reason);
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Harvest aborted: {}", summary.stop_reason);
        Ok(ExitCode::from(2))
    }
}
