//! Process-wide run state
//!
//! One shared block of atomics: the cooperative stop flag, the two
//! discovery-suspension flags, and the running totals shown in the stats
//! table. Everything here is initialized once at startup and polled by the
//! workers and the main loop; there is no teardown beyond process exit.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared flags and counters for a crawl run
#[derive(Debug, Default)]
pub struct RunFlags {
    /// Cooperative cancellation: set by ctrl-c, polled everywhere
    stop: AtomicBool,

    /// Operator flag: never add newly discovered URLs
    no_new_urls: AtomicBool,

    /// Backpressure flag: discovery suspended while the pending queue is deep
    suspend_auto: AtomicBool,

    /// Pages processed by the worker pool this run
    total_pages: AtomicU64,

    /// Images discovered by the extractors this run
    total_images: AtomicU64,
}

impl RunFlags {
    pub fn new(no_new_urls: bool) -> Arc<Self> {
        let flags = Self::default();
        flags.no_new_urls.store(no_new_urls, Ordering::Relaxed);
        Arc::new(flags)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// True while link discovery should be skipped, for either reason
    pub fn discovery_suspended(&self) -> bool {
        self.no_new_urls.load(Ordering::Relaxed) || self.suspend_auto.load(Ordering::Relaxed)
    }

    pub fn set_suspend_auto(&self, suspended: bool) {
        self.suspend_auto.store(suspended, Ordering::Relaxed);
    }

    pub fn suspend_auto(&self) -> bool {
        self.suspend_auto.load(Ordering::Relaxed)
    }

    pub fn record_page(&self) {
        self.total_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image(&self) {
        self.total_images.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages.load(Ordering::Relaxed)
    }

    pub fn total_images(&self) -> u64 {
        self.total_images.load(Ordering::Relaxed)
    }
}
