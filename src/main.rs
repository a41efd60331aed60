//! Lapse-Crawler main entry point
//!
//! This is the command-line interface for the Lapse-Crawler expired domain finder.

use anyhow::Context;
use clap::Parser;
use lapse_crawler::config::{load_config_with_hash, Config};
use lapse_crawler::output::{print_report, render_json};
use lapse_crawler::state::{InMemoryJobStore, JobStateContainer, JobStatus};
use lapse_crawler::{CrawlEngine, RdapChecker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PROGRESS_TICK: Duration = Duration::from_secs(5);

/// Lapse-Crawler: find expired domains linked from a website
///
/// Crawls each site breadth-first, collects every external link, and checks
/// whether the linked domains' registrations have lapsed.
#[derive(Parser, Debug)]
#[command(name = "lapse-crawler")]
#[command(version)]
#[command(about = "Find expired domains linked from a website", long_about = None)]
struct Cli {
    /// Site(s) to crawl; a missing scheme means https
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print job snapshots as JSON instead of text reports
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let failed = handle_crawl(config, &cli.urls, cli.json).await?;
    if failed > 0 {
        anyhow::bail!("{} of {} jobs ended in error", failed, cli.urls.len());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lapse_crawler=info,warn"),
            1 => EnvFilter::new("lapse_crawler=debug,info"),
            2 => EnvFilter::new("lapse_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one job per URL and prints the results
///
/// Returns the number of jobs that ended in `error`.
async fn handle_crawl(config: Config, urls: &[String], json: bool) -> anyhow::Result<usize> {
    let store = Arc::new(InMemoryJobStore::new());
    let checker = Arc::new(
        RdapChecker::new(&config.expiry, &config.http.user_agent)
            .context("failed to build RDAP client")?,
    );
    let engine = Arc::new(
        CrawlEngine::new(&config, store.clone(), checker).context("failed to build crawler")?,
    );

    let handles: Vec<_> = urls.iter().map(|url| engine.spawn(url.as_str())).collect();
    tracing::info!("Started {} crawl jobs", handles.len());

    let stopper = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping all jobs");
                for id in store.active_ids() {
                    store.stop(&id);
                }
            }
        })
    };

    let ticker = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_TICK);
            interval.tick().await;
            loop {
                interval.tick().await;
                for job in store.jobs().iter().filter(|job| !job.is_terminal()) {
                    tracing::info!(
                        "{}: {:.0}% ({} pages, {} external links, {} expired)",
                        job.seed_url.as_deref().unwrap_or(&job.input),
                        job.progress,
                        job.crawled_urls.len(),
                        job.external_links.len(),
                        job.expired_domains.len()
                    );
                }
            }
        })
    };

    let mut jobs = Vec::with_capacity(handles.len());
    for (id, handle) in handles {
        match handle.await {
            Ok(job) => jobs.push(job),
            Err(e) => {
                tracing::error!("Job {} task failed: {}", id, e);
                if let Some(job) = store.get_job(&id) {
                    jobs.push(job);
                }
            }
        }
    }

    ticker.abort();
    stopper.abort();

    if json {
        println!("{}", render_json(&jobs)?);
    } else {
        for job in &jobs {
            print_report(job);
        }
    }

    Ok(jobs
        .iter()
        .filter(|job| job.status == JobStatus::Error)
        .count())
}
