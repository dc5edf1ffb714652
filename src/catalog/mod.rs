//! Shared in-memory catalog
//!
//! [`Catalog`] is the one structure mutated from multiple workers. It wraps
//! the in-memory [`MetaStore`] in a mutex and exposes one logical operation
//! per lock acquisition; the lock is never held across a network or disk
//! operation. Worker-facing methods swallow storage errors after logging
//! them, so no per-URL failure can take a worker down; startup and
//! synchronizer methods propagate errors because those are fatal or must be
//! reported.

use crate::storage::{
    CatalogCounts, ImageMetadata, ImageRecord, MetaStore, PageRecord, StorageResult,
};
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard};

/// Current local time in the catalog's timestamp format
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// The shared page/image catalog backing a crawl run
#[derive(Clone)]
pub struct Catalog {
    store: Arc<Mutex<MetaStore>>,
}

impl Catalog {
    /// Creates an empty in-memory catalog
    pub fn new() -> Result<Self> {
        Ok(Self {
            store: Arc::new(Mutex::new(MetaStore::in_memory()?)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MetaStore> {
        self.store.lock().unwrap()
    }

    // ===== Worker-facing operations =====

    /// Atomically claims one pending page, or returns `None`
    pub fn claim_next_pending(&self) -> Option<String> {
        match self.lock().claim_next_pending(&now_timestamp()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("claim failed: {}", e);
                None
            }
        }
    }

    /// Records the terminal status of a claimed page
    pub fn finalize_page(&self, url: &str, status_code: u16) {
        if let Err(e) = self.lock().finalize_page(url, status_code) {
            tracing::debug!("finalize of {} failed: {}", url, e);
        }
    }

    /// Insert-or-refresh a discovered page
    pub fn upsert_page(&self, url: &str, last_seen: &str) {
        if let Err(e) = self.lock().upsert_page(url, last_seen) {
            tracing::debug!("page upsert of {} failed: {}", url, e);
        }
    }

    /// Attempts to insert a discovered image; `true` means the image is new
    /// and its download pipeline should run. Storage failures count as
    /// not-new.
    pub fn upsert_image_if_new(&self, image: &ImageRecord) -> bool {
        match self.lock().upsert_image_if_new(image) {
            Ok(is_new) => is_new,
            Err(e) => {
                tracing::debug!("image upsert of {} failed: {}", image.url, e);
                false
            }
        }
    }

    /// Patches resolved metadata after a successful download
    pub fn update_image_metadata(&self, url: &str, meta: &ImageMetadata) {
        if let Err(e) = self.lock().update_image_metadata(url, meta) {
            tracing::debug!("metadata update of {} failed: {}", url, e);
        }
    }

    /// Permanently rejects an image for this run
    pub fn mark_image_unsupported(&self, url: &str) {
        if let Err(e) = self.lock().mark_image_unsupported(url) {
            tracing::debug!("unsupported mark of {} failed: {}", url, e);
        }
    }

    /// Aggregate counts for backpressure and the stats display
    pub fn counts(&self) -> CatalogCounts {
        match self.lock().counts() {
            Ok(counts) => counts,
            Err(e) => {
                tracing::debug!("counts query failed: {}", e);
                CatalogCounts::default()
            }
        }
    }

    // ===== Synchronizer operations =====

    /// Removes terminal-failure pages and unsupported images
    pub fn prune_terminal_failures(&self) -> StorageResult<(usize, usize)> {
        self.lock().prune_terminal_failures()
    }

    /// Snapshot of every record, for the durable flush
    pub fn export_all(&self) -> StorageResult<(Vec<PageRecord>, Vec<ImageRecord>)> {
        let store = self.lock();
        Ok((store.load_pages()?, store.load_images()?))
    }

    /// Loads all durable records into this catalog at startup
    pub fn import_from(&self, durable: &MetaStore) -> Result<(usize, usize)> {
        let pages = durable.load_pages()?;
        let images = durable.load_images()?;
        let store = self.lock();
        for page in &pages {
            store.insert_page_if_absent(page)?;
        }
        for image in &images {
            store.upsert_image_if_new(image)?;
        }
        Ok((pages.len(), images.len()))
    }

    /// Inserts the seed page record, ignoring it when already present
    pub fn seed(&self, url: &str) -> Result<bool> {
        let page = PageRecord::pending(url.to_string(), now_timestamp());
        Ok(self.lock().insert_page_if_absent(&page)?)
    }
}
