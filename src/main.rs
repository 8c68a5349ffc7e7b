//! Frontier service main entry point
//!
//! This is the command-line interface for the URL frontier.

use anyhow::Context;
use clap::Parser;
use frontier_service::config::{load_config_with_hash, Config};
use frontier_service::frontier::spawn_service_loops;
use frontier_service::registry::{open_registry, sync_configured_domains, DomainRegistry};
use frontier_service::stats::print_statistics;
use frontier_service::Frontier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

/// Frontier service: decides which URL a distributed crawler fetches next
///
/// URLs are admitted against the domain registry and robots.txt, queued by
/// domain priority, and handed out one host bucket at a time. Fetch tasks
/// are written to stdout, one URL per line.
#[derive(Parser, Debug)]
#[command(name = "frontier-service")]
#[command(version = "1.0.0")]
#[command(about = "URL frontier for a distributed web crawler", long_about = None)]
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

    /// Read discovered URLs and `retry` failure reports from stdin, one per line
    #[arg(long)]
    stdin: bool,

    /// Validate config and print it without starting the service
    #[arg(long, conflicts_with_all = ["list_domains", "sync_domains"])]
    dry_run: bool,

    /// Print the domain registry and exit
    #[arg(long, conflicts_with_all = ["dry_run", "sync_domains"])]
    list_domains: bool,

    /// Register configured domains missing from the registry and exit
    #[arg(long, conflicts_with_all = ["dry_run", "list_domains"])]
    sync_domains: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the fetch-task stream
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.list_domains {
        handle_list_domains(&config)?;
    } else if cli.sync_domains {
        handle_sync_domains(&config)?;
    } else {
        handle_run(config, cli.stdin).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("frontier_service=info,warn"),
            1 => EnvFilter::new("frontier_service=debug,info"),
            2 => EnvFilter::new("frontier_service=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Frontier Service Dry Run ===\n");

    let frontier = &config.frontier;
    println!("Queues:");
    println!("  Front queue capacity: {}", frontier.front_queue_capacity);
    println!("  Sub-buckets per tier: {}", frontier.sub_buckets);
    println!("  Fallback tiers: {}", frontier.fallback_tiers);
    println!("  Weighted schedule: {:?}", frontier.weighted_schedule);
    println!(
        "  Back queues: {} x {}",
        frontier.back_queue_count, frontier.back_queue_capacity
    );
    println!("  Default crawl delay: {}s", frontier.default_crawl_delay);

    let robots = &config.robots;
    println!("\nRobots.txt:");
    println!("  Enabled: {}", robots.enabled);
    println!("  User agent: {}", robots.user_agent);
    println!("  Cache size: {} hosts", robots.cache_size);
    println!(
        "  TTL: {}h (failed fetches: {}m)",
        robots.ttl_hours, robots.failed_fetch_ttl_minutes
    );
    println!("  Timeout: {}ms", robots.timeout_ms);

    let scheduler = &config.scheduler;
    println!("\nScheduler:");
    println!(
        "  Drain: every {}ms, {} URLs",
        scheduler.drain_interval_ms, scheduler.drain_batch_size
    );
    println!(
        "  Dispatch: every {}ms, {} URLs",
        scheduler.dispatch_interval_ms, scheduler.dispatch_batch_size
    );
    println!(
        "  Retry sweep: every {}ms, {} URLs ({:?}, max {} retries)",
        scheduler.retry_interval_ms,
        scheduler.retry_batch_size,
        config.retry.policy,
        config.retry.max_retries
    );

    println!("\nRegistry:");
    println!("  Database: {}", config.registry.database_path);

    println!("\nConfigured Domains ({}):", config.domains.len());
    for entry in &config.domains {
        println!(
            "  - {} (priority {}{})",
            entry.host,
            entry.priority,
            if entry.active { "" } else { ", inactive" }
        );
        for seed in entry.seed_urls() {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --list-domains mode: prints every registered domain
fn handle_list_domains(config: &Config) -> anyhow::Result<()> {
    let registry = open_registry(Path::new(&config.registry.database_path))
        .context("Failed to open domain registry")?;
    let domains = registry.list_all()?;

    println!("Database: {}\n", config.registry.database_path);
    println!("Domains ({}):", domains.len());
    for domain in domains {
        let last_crawled = domain
            .last_crawled
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  - {} (priority {}, {}, last crawled {})",
            domain.host,
            domain.priority,
            if domain.active { "active" } else { "inactive" },
            last_crawled
        );
    }

    Ok(())
}

/// Handles the --sync-domains mode: bootstraps configured domains
fn handle_sync_domains(config: &Config) -> anyhow::Result<()> {
    let registry = open_registry(Path::new(&config.registry.database_path))
        .context("Failed to open domain registry")?;
    let inserted = sync_configured_domains(&registry, &config.domains)?;

    println!(
        "✓ Registered {} of {} configured domains",
        inserted,
        config.domains.len()
    );
    Ok(())
}

/// Runs the frontier until Ctrl-C
///
/// With `--stdin`, each input line is either a discovered URL or a
/// `retry <url> <count> <rfc3339> [status]` failure report. End of input
/// stops the reader only; the loops keep dispatching what is queued.
async fn handle_run(config: Config, read_stdin: bool) -> anyhow::Result<()> {
    let registry = open_registry(Path::new(&config.registry.database_path))
        .context("Failed to open domain registry")?;
    let inserted = sync_configured_domains(&registry, &config.domains)?;
    if inserted > 0 {
        tracing::info!("Registered {} configured domains", inserted);
    }

    let frontier = Arc::new(
        Frontier::from_config(&config, Arc::new(registry))
            .context("Failed to initialize frontier")?,
    );

    let (task_tx, mut task_rx) = mpsc::channel(config.scheduler.dispatch_batch_size.max(1) * 4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = spawn_service_loops(
        Arc::clone(&frontier),
        config.scheduler.clone(),
        task_tx,
        shutdown_rx,
    );

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(url) = task_rx.recv().await {
            let line = format!("{}\n", url);
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                tracing::error!("Failed to write fetch task: {}", e);
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    if read_stdin {
        let frontier = Arc::clone(&frontier);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => frontier.ingest_line(&line).await,
                    Ok(None) => {
                        tracing::info!("Reached end of stdin");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        });
    }

    tracing::info!("Frontier service running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Service loop ended abnormally: {}", e);
        }
    }
    // All senders are gone once the loops stop, so the writer drains and exits
    let _ = writer.await;

    print_statistics(&frontier.stats());
    Ok(())
}
