//! Command-line entry point

use anyhow::Context;
use clap::Parser;
use snapspider::cache;
use snapspider::config::{Config, CrawlOptions, MAX_WORKERS};
use snapspider::crawler::run_crawl;
use snapspider::state::RunFlags;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Image-harvesting web crawler
#[derive(Parser, Debug)]
#[command(name = "snapspider", version, about)]
struct Cli {
    /// Enable debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Mirror the in-memory catalog to disk on every flush pass
    #[arg(short = 'f', long)]
    auto_flush: bool,

    /// Never add newly discovered URLs to the queue
    #[arg(short = 'u', long)]
    no_new_urls: bool,

    /// Seconds between stats refreshes
    #[arg(short = 'r', long, default_value_t = 20)]
    refresh_time: u64,

    /// Number of crawl workers (default: available CPUs)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Seed URL to start crawling from
    #[arg(short = 'a', long)]
    start_url: Option<String>,

    /// Move the blob cache and image metadata to this directory, then exit
    #[arg(short = 'm', long, value_name = "DIR")]
    move_cache: Option<PathBuf>,

    /// Delete cached blobs with no metadata row, then exit
    #[arg(short = 's', long)]
    sync_cache: bool,

    /// Path to a TOML file overriding the built-in limits
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "snapspider=debug"
    } else {
        "snapspider=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Interruptible wrapper for the offline cache utilities
async fn run_one_shot<F, R>(job: F) -> anyhow::Result<R>
where
    F: FnOnce(Arc<RunFlags>) -> snapspider::Result<R> + Send + 'static,
    R: Send + 'static,
{
    let flags = RunFlags::new(false);
    {
        let flags = flags.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping");
                flags.request_stop();
            }
        });
    }
    let result = tokio::task::spawn_blocking(move || job(flags))
        .await
        .context("cache job panicked")?;
    Ok(result?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(dest) = cli.move_cache {
        let db = PathBuf::from(&config.database_path);
        let src_cache = PathBuf::from(&config.cache_dir);
        let report =
            run_one_shot(move |flags| cache::move_cache(&db, &src_cache, &dest, &flags)).await?;
        println!(
            "moved {} blob(s), merged {} record(s)",
            report.blobs_moved, report.records_merged
        );
        return Ok(());
    }

    if cli.sync_cache {
        let db = PathBuf::from(&config.database_path);
        let cache_root = PathBuf::from(&config.cache_dir);
        let report =
            run_one_shot(move |flags| cache::reconcile(&db, &cache_root, &flags)).await?;
        println!(
            "scanned {} blob(s), removed {}",
            report.blobs_scanned, report.blobs_removed
        );
        return Ok(());
    }

    let workers = cli
        .threads
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
        .clamp(1, MAX_WORKERS);

    let options = CrawlOptions {
        auto_flush: cli.auto_flush,
        no_new_urls: cli.no_new_urls,
        refresh_secs: cli.refresh_time,
        workers,
        start_url: cli.start_url,
    };
    run_crawl(config, options).await?;
    Ok(())
}
