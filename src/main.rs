//! Spider main entry point
//!
//! This is the command-line interface for the Spider crawl engine.

use anyhow::Context;
use clap::Parser;
use spider::config::{load_config_with_hash, Config, StoreBackend};
use spider::crawler::{shutdown_on_ctrl_c, Engine, HttpFetcher};
use spider::frontier::{FrontierStore, RedisFrontier, SqliteFrontier};
use spider::output::{load_statistics, print_statistics, render_run_summary};
use spider::sink::SqlitePageSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Spider: a polite, distributed web crawler
///
/// Spider claims one host at a time per worker, honors each host's
/// robots.txt and crawl delay, and stores crawled pages in SQLite.
/// Several processes can share one frontier through Redis.
#[derive(Parser, Debug)]
#[command(name = "spider")]
#[command(version)]
#[command(about = "A polite, distributed web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Extra seed URLs, added to those in the config
    #[arg(value_name = "SEEDS")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show frontier and page statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    config.seeds.extend(cli.seeds.iter().cloned());

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence over the flags when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "spider=info,warn",
            1 => "spider=debug,info",
            2 => "spider=trace,debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens the configured frontier backend
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn FrontierStore>> {
    let store: Arc<dyn FrontierStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            tracing::info!(path = %config.store.path, "Using SQLite frontier");
            Arc::new(
                SqliteFrontier::open(Path::new(&config.store.path))
                    .context("failed to open SQLite frontier")?,
            )
        }
        StoreBackend::Redis => Arc::new(
            RedisFrontier::connect(&config.store.url, &config.store.namespace)
                .await
                .context("failed to connect to Redis frontier")?,
        ),
    };
    Ok(store)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Spider Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max workers: {}", config.crawler.max_workers);
    println!("  Max pages per host: {}", config.crawler.max_pages);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Default crawl delay: {}s", config.crawler.crawl_delay);
    println!("  Claim lease: {}s", config.crawler.claim_lease_secs);
    println!("  Exit when idle: {}", config.crawler.exit_when_idle);

    println!("\nUser Agent:");
    println!("  Robots name: {}", config.user_agent.name);
    println!("  Header: {}", config.user_agent.header);

    println!("\nFrontier Store:");
    match config.store.backend {
        StoreBackend::Sqlite => println!("  SQLite: {}", config.store.path),
        StoreBackend::Redis => println!(
            "  Redis: {} (namespace '{}')",
            config.store.url, config.store.namespace
        ),
    }

    println!("\nOutput:");
    println!("  Pages database: {}", config.output.database_path);
    println!("  Queue capacity: {}", config.output.queue_capacity);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        match spider::normalize(seed, "") {
            Some(normalized) => println!("  - {}", normalized),
            None => println!("  - {} (rejected)", seed),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the frontier and pages database
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;

    let pages_path = Path::new(&config.output.database_path);
    let pages = if pages_path.exists() {
        Some(SqlitePageSink::open(pages_path).context("failed to open pages database")?)
    } else {
        None
    };

    let stats = load_statistics(store.as_ref(), pages.as_ref()).await?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let fetcher = Arc::new(
        HttpFetcher::new(&config.user_agent.header, config.crawler.request_timeout())
            .context("failed to build HTTP client")?,
    );
    let sink = Arc::new(
        SqlitePageSink::open(Path::new(&config.output.database_path))
            .context("failed to open pages database")?,
    );

    let engine = Engine::from_config(&config, store, fetcher);
    let seeded = engine.seed(&config.seeds).await?;
    tracing::info!(seeds = seeded, "Seeded frontier");

    let summary = engine.run(sink, shutdown_on_ctrl_c()).await?;
    print!("{}", render_run_summary(&summary));

    Ok(())
}
