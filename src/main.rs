//! Driftnet main entry point
//!
//! This is the command-line interface for the Driftnet crawl engine.

use clap::Parser;
use driftnet::config::{load_config_with_hash, validate, Config};
use driftnet::crawler::{start_crawl, CrawlOptions, CrawlReport, FetcherKind};
use driftnet::output::{RecordSink, SqliteSink};
use driftnet::policy::ScopePolicy;
use driftnet::storage::{RunStatus, SqliteStorage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Driftnet: a concurrent, depth-bounded web crawler
///
/// Driftnet crawls a site from a seed URL or sitemap, fetching every page
/// at most once, and stores titles, text, links and media in SQLite. Each
/// crawl is compared against stored history to report changed pages.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version)]
#[command(about = "A concurrent, depth-bounded web crawler", long_about = None)]
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

    /// Override the seed URL from the config
    #[arg(long)]
    seed: Option<String>,

    /// Override the maximum crawl depth
    #[arg(long)]
    depth: Option<u32>,

    /// Override the number of concurrent workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the fetch strategy (http or render)
    #[arg(long)]
    fetcher: Option<FetcherKind>,

    /// Start a fresh crawl, discarding saved visited state
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "export_summary"])]
    stats: bool,

    /// Export stored pages to FILE (.json or .csv) and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    export: Option<PathBuf>,

    /// Generate markdown summary from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export {
        handle_export(&config, path)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
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

/// Applies command-line overrides and re-validates the result
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut changed = false;

    if let Some(seed) = &cli.seed {
        config.crawler.seed = seed.clone();
        changed = true;
    }
    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
        changed = true;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrency = concurrency;
        changed = true;
    }
    if let Some(fetcher) = cli.fetcher {
        config.crawler.fetcher = fetcher;
        changed = true;
    }

    if changed {
        validate(config)?;
    }
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Driftnet Dry Run ===\n");

    println!("Crawl:");
    println!("  Seed: {}", config.crawler.seed);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Fetcher: {}", config.crawler.fetcher.as_str());

    println!("\nScope Policy:");
    println!("  Same domain only: {}", config.policy.same_domain_only);
    println!(
        "  Link pattern: {}",
        config.policy.link_regex.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Keyword filter: {}",
        config.policy.keyword_filter.as_deref().unwrap_or("(none)")
    );
    println!("  Respect robots.txt: {}", config.policy.respect_robots);

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!(
        "  Backoff: {}ms (cap {}ms)",
        config.fetch.backoff_base_ms, config.fetch.backoff_cap_ms
    );
    if let Some(proxy) = &config.fetch.proxy {
        println!("  Proxy: {}", proxy);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!(
        "  State directory: {}",
        config.output.state_dir.as_deref().unwrap_or("(in memory)")
    );
    println!("  Summary: {}", config.output.summary_path);
    if config.media.enabled {
        println!("  Media: {}", config.media.directory);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use driftnet::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes stored pages as JSON or CSV
fn handle_export(config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    use driftnet::output::export_pages;

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let exported = export_pages(&storage, path)?;

    println!("✓ Exported {} pages to: {}", exported, path.display());

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Crawl Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    write_summary(&storage, None, &config.output.summary_path)?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

fn write_summary(
    storage: &dyn driftnet::storage::Storage,
    report: Option<&CrawlReport>,
    summary_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use driftnet::output::{generate_markdown_summary, generate_summary};

    tracing::info!("Generating markdown summary...");
    let summary = generate_summary(storage, report)?;
    generate_markdown_summary(&summary, Path::new(summary_path))?;
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if saved state exists)");
    }

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let mut sink = SqliteSink::new(Box::new(storage), &config.crawler.seed, config_hash)?;
    if config.render.screenshot {
        sink = sink.with_screenshot_dir(Path::new(&config.media.directory).join("screenshots"));
    }

    let policy = ScopePolicy::from_config(&config.policy)?;
    let mut options = CrawlOptions::from_config(&config);
    options.fresh = fresh;

    let mut handle = match start_crawl(
        &config.crawler.seed,
        policy,
        config.crawler.max_depth,
        config.crawler.max_concurrency,
        config.crawler.fetcher,
        options,
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Crawl failed to start: {}", e);
            sink.finalize(RunStatus::Failed)?;
            return Err(e.into());
        }
    };

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            token.cancel();
        }
    });

    while let Some(record) = handle.next_record().await {
        match sink.record(&record) {
            Ok(change) if change.is_different => {
                tracing::info!("{} [{}] {}", record.url, record.depth, change.summary);
            }
            Ok(_) => tracing::debug!("{} unchanged", record.url),
            Err(e) => tracing::error!("Failed to save {}: {}", record.url, e),
        }
    }

    let report = match handle.join().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            sink.finalize(RunStatus::Failed)?;
            return Err(e.into());
        }
    };

    let status = if report.cancelled {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    };
    sink.finalize(status)?;

    write_summary(sink.storage(), Some(&report), &config.output.summary_path)?;
    tracing::info!("Summary written to {}", config.output.summary_path);

    Ok(())
}
