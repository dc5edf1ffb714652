//! Crawl orchestration
//!
//! [`run_crawl`] owns the lifetime of a crawl session: it restores the
//! catalog from the durable store, seeds it, spawns the worker pool, and
//! then supervises until a stop is requested. The supervision loop is the
//! only place that touches the durable store while workers run; workers
//! see nothing but the in-memory catalog.

pub mod backpressure;
pub mod extract;
pub mod fetcher;
pub mod worker;

use crate::catalog::Catalog;
use crate::config::{Config, CrawlOptions};
use crate::crawler::backpressure::Hysteresis;
use crate::crawler::worker::{run_worker, WorkerContext};
use crate::output::{print_header, StatusRow};
use crate::state::RunFlags;
use crate::storage::MetaStore;
use crate::{Result, SpiderError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ::url::Url;

/// Supervision loop tick
const TICK: Duration = Duration::from_secs(1);

/// Runs a full crawl session until interrupted
pub async fn run_crawl(config: Config, options: CrawlOptions) -> Result<()> {
    let mut durable = MetaStore::open(Path::new(&config.database_path))?;
    let catalog = Catalog::new()?;

    let (pages, images) = catalog.import_from(&durable)?;
    tracing::info!("restored {} page(s) and {} image(s) from disk", pages, images);

    if let Some(start) = &options.start_url {
        Url::parse(start)?;
        if catalog.seed(start)? {
            tracing::info!("seeded {}", start);
        } else {
            tracing::info!("seed {} already known", start);
        }
    }
    if catalog.counts().pending_pages == 0 {
        return Err(SpiderError::Startup(
            "nothing to crawl: no pending pages on disk and no start URL given".to_string(),
        ));
    }

    let flags = RunFlags::new(options.no_new_urls);
    {
        let flags = flags.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping");
                flags.request_stop();
            }
        });
    }

    let ctx = WorkerContext {
        catalog: catalog.clone(),
        flags: flags.clone(),
        config: Arc::new(config.clone()),
        page_client: fetcher::build_page_client(&config)?,
        image_client: fetcher::build_image_client(&config)?,
        cache_root: PathBuf::from(&config.cache_dir),
    };

    tracing::info!("starting {} worker(s)", options.workers);
    let mut handles = Vec::with_capacity(options.workers);
    for id in 0..options.workers {
        handles.push(tokio::spawn(run_worker(id, ctx.clone())));
    }

    supervise(&config, &options, &catalog, &flags, &mut durable).await;

    for handle in handles {
        let _ = handle.await;
    }

    shutdown_flush(&catalog, &mut durable)?;
    tracing::info!(
        "session done: {} page(s) crawled, {} image(s) cached",
        flags.total_pages(),
        flags.total_images()
    );
    Ok(())
}

/// Stats, backpressure, and periodic flush until a stop is requested
async fn supervise(
    config: &Config,
    options: &CrawlOptions,
    catalog: &Catalog,
    flags: &Arc<RunFlags>,
    durable: &mut MetaStore,
) {
    let refresh = Duration::from_secs(options.refresh_secs.max(1));
    let flush_every = Duration::from_secs(config.auto_flush_secs);
    let mut gate = Hysteresis::new(config.queue_threshold_max, config.queue_threshold_min);
    let mut last_stats = Instant::now();
    let mut last_flush = Instant::now();

    print_header();
    while !flags.stop_requested() {
        tokio::time::sleep(TICK).await;

        let counts = catalog.counts();
        let suspend = gate.observe(counts.pending_pages);
        if suspend != flags.suspend_auto() {
            tracing::info!(
                "pending queue at {}, discovery {}",
                counts.pending_pages,
                if suspend { "suspended" } else { "resumed" }
            );
            flags.set_suspend_auto(suspend);
        }

        if last_stats.elapsed() >= refresh {
            last_stats = Instant::now();
            println!(
                "{}",
                StatusRow {
                    session_pages: flags.total_pages(),
                    session_images: flags.total_images(),
                    counts,
                }
            );
        }

        if last_flush.elapsed() >= flush_every {
            last_flush = Instant::now();
            periodic_flush(catalog, durable, options.auto_flush);
        }
    }
}

/// Prunes terminal failures and, when enabled, mirrors the catalog to disk
fn periodic_flush(catalog: &Catalog, durable: &mut MetaStore, mirror: bool) {
    match catalog.prune_terminal_failures() {
        Ok((pages, images)) => {
            tracing::info!("pruned {} failed page(s), {} unsupported image(s)", pages, images)
        }
        Err(e) => tracing::warn!("prune failed: {}", e),
    }
    if !mirror {
        return;
    }
    let snapshot = match catalog.export_all() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("flush snapshot failed: {}", e);
            return;
        }
    };
    match durable.replace_all(&snapshot.0, &snapshot.1) {
        Ok(()) => tracing::info!(
            "flushed {} page(s) and {} image(s) to disk",
            snapshot.0.len(),
            snapshot.1.len()
        ),
        Err(e) => tracing::warn!("flush failed: {}", e),
    }
}

/// Final prune and unconditional flush at the end of a session
fn shutdown_flush(catalog: &Catalog, durable: &mut MetaStore) -> Result<()> {
    let (pages, images) = catalog.prune_terminal_failures()?;
    tracing::info!("final prune removed {} page(s), {} image(s)", pages, images);

    let (page_rows, image_rows) = catalog.export_all()?;
    durable.replace_all(&page_rows, &image_rows)?;
    tracing::info!(
        "persisted {} page(s) and {} image(s)",
        page_rows.len(),
        image_rows.len()
    );
    Ok(())
}
