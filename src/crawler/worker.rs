//! Crawl workers
//!
//! Each worker loops over one unit of work: claim a pending page, fetch
//! it, harvest links and images, and run the download pipeline for every
//! image it is the first to discover. An empty queue puts the worker to
//! sleep briefly rather than exiting, since a sibling may publish new
//! pages at any time.

use crate::cache;
use crate::catalog::{now_timestamp, Catalog};
use crate::config::{Config, FAILURE_STATUS};
use crate::crawler::extract::{self, ImageHit};
use crate::crawler::fetcher::{fetch_page, FetchOutcome};
use crate::images::download_image;
use crate::state::RunFlags;
use crate::storage::ImageRecord;
use reqwest::Client;
use scraper::Html;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How long an idle worker waits before polling the queue again
const IDLE_POLL: Duration = Duration::from_secs(3);

/// Everything a worker needs, shared across the pool
#[derive(Clone)]
pub struct WorkerContext {
    pub catalog: Catalog,
    pub flags: Arc<RunFlags>,
    pub config: Arc<Config>,
    pub page_client: Client,
    pub image_client: Client,
    pub cache_root: PathBuf,
}

/// Worker main loop; returns when a stop is requested
pub async fn run_worker(id: usize, ctx: WorkerContext) {
    tracing::debug!("worker {} started", id);
    while !ctx.flags.stop_requested() {
        if !process_next(&ctx).await {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }
    tracing::debug!("worker {} stopped", id);
}

/// Processes one claimed page end to end
///
/// Returns `false` when there was nothing to claim.
pub async fn process_next(ctx: &WorkerContext) -> bool {
    let Some(url) = ctx.catalog.claim_next_pending() else {
        return false;
    };
    tracing::debug!("crawling {}", url);

    let body = match fetch_page(&ctx.page_client, &url, ctx.config.max_page_size).await {
        FetchOutcome::Success { body } => body,
        FetchOutcome::HttpError { status_code } => {
            tracing::debug!("{} returned {}", url, status_code);
            ctx.catalog.finalize_page(&url, status_code);
            return true;
        }
        FetchOutcome::NetworkError { error } => {
            tracing::debug!("{} failed: {}", url, error);
            ctx.catalog.finalize_page(&url, FAILURE_STATUS);
            return true;
        }
    };

    // The parsed document is not Send, so all extraction happens inside
    // this block; it must be dropped before the first await below.
    let hits = {
        let doc = Html::parse_document(&body);
        if !ctx.flags.discovery_suspended() {
            let found = extract::harvest_links(&doc, &url, &ctx.catalog, &ctx.config);
            tracing::debug!("{} yielded {} link(s)", url, found);
        }
        let seed = extract::caption_seed(&doc);
        extract::collect_images(&doc, &url, &seed, &ctx.config)
    };

    ctx.flags.record_page();
    process_images(ctx, &url, hits).await;
    true
}

/// Runs the download pipeline for every image this worker discovered first
async fn process_images(ctx: &WorkerContext, page_url: &str, hits: Vec<ImageHit>) {
    for hit in hits {
        if ctx.flags.stop_requested() {
            return;
        }

        let mut record = ImageRecord::discovered(
            hit.url.clone(),
            page_url.to_string(),
            now_timestamp(),
        );
        if !hit.alt.is_empty() {
            record.alt = Some(hit.alt.clone());
        }
        if !hit.surrounding.is_empty() {
            record.surrounding = Some(hit.surrounding.clone());
        }
        if !ctx.catalog.upsert_image_if_new(&record) {
            continue;
        }

        let dest = cache::blob_path(&ctx.cache_root, &hit.url);
        match download_image(&ctx.image_client, &hit.url, &dest, &ctx.config).await {
            Ok(mut meta) => {
                meta.alt = hit.alt;
                meta.surrounding = hit.surrounding;
                ctx.catalog.update_image_metadata(&hit.url, &meta);
                ctx.flags.record_image();
            }
            Err(e) => {
                tracing::debug!("image {} rejected: {}", hit.url, e);
                ctx.catalog.mark_image_unsupported(&hit.url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn context(cache_root: PathBuf) -> WorkerContext {
        let config = Arc::new(Config::default());
        WorkerContext {
            catalog: Catalog::new().unwrap(),
            flags: RunFlags::new(false),
            page_client: crate::crawler::fetcher::build_page_client(&config).unwrap(),
            image_client: crate::crawler::fetcher::build_image_client(&config).unwrap(),
            config,
            cache_root,
        }
    }

    #[tokio::test]
    async fn empty_queue_reports_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf()).await;
        assert!(!process_next(&ctx).await);
    }

    #[tokio::test]
    async fn http_error_finalizes_with_that_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf()).await;
        let url = format!("{}/gone", server.uri());
        ctx.catalog.upsert_page(&url, &now_timestamp());

        assert!(process_next(&ctx).await);
        let counts = ctx.catalog.counts();
        assert_eq!(counts.pending_pages, 0);
        // Not a 200, so it does not count as visited either
        assert_eq!(counts.visited_pages, 0);
    }

    #[tokio::test]
    async fn unreachable_host_finalizes_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf()).await;
        ctx.catalog.upsert_page("http://127.0.0.1:1/x", &now_timestamp());

        assert!(process_next(&ctx).await);
        assert_eq!(ctx.catalog.counts().pending_pages, 0);
    }

    #[tokio::test]
    async fn successful_page_harvests_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><a href="/next">next</a></body></html>"#,
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf()).await;
        ctx.catalog.upsert_page(&format!("{}/", server.uri()), &now_timestamp());

        assert!(process_next(&ctx).await);
        let counts = ctx.catalog.counts();
        assert_eq!(counts.visited_pages, 1);
        assert_eq!(counts.pending_pages, 1, "the discovered link is pending");
        assert_eq!(ctx.flags.total_pages(), 1);
    }

    #[tokio::test]
    async fn suspended_discovery_skips_links_but_not_images() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/next">n</a><img src="http://127.0.0.1:1/i.jpg">"#,
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().to_path_buf()).await;
        ctx.flags.set_suspend_auto(true);
        ctx.catalog.upsert_page(&format!("{}/", server.uri()), &now_timestamp());

        assert!(process_next(&ctx).await);
        let counts = ctx.catalog.counts();
        assert_eq!(counts.pending_pages, 0, "no new links while suspended");
        // The image was still discovered; its unreachable host marks it
        // unsupported, which leaves it out of the resolved count
        assert_eq!(counts.resolved_images, 0);
    }
}
