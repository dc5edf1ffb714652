//! Storage module for crawl metadata
//!
//! One rusqlite-backed table store, [`MetaStore`], serves both catalog
//! tiers: the in-memory store that every crawl operation touches, and the
//! durable on-disk store reconciled by the persistence synchronizer. Both
//! hold the same two tables, pages and images, keyed by canonical URL.

mod schema;
mod sqlite;

pub use schema::initialize_schema;
pub use sqlite::MetaStore;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A page known to the crawler
///
/// `last_crawled` absent means the page is pending; claiming a page sets it
/// together with a provisional success status in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub url: String,
    pub last_crawled: Option<String>,
    pub last_seen: String,
    pub status_code: u16,
}

impl PageRecord {
    /// A freshly discovered, not-yet-fetched page
    pub fn pending(url: String, last_seen: String) -> Self {
        Self {
            url,
            last_crawled: None,
            last_seen,
            status_code: crate::config::PENDING_STATUS,
        }
    }
}

/// An image discovered on some page
///
/// Metadata fields stay zero/empty until the download pipeline resolves
/// them; a `mime` equal to the unsupported sentinel marks a permanently
/// rejected image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub url: String,
    pub alt: Option<String>,
    pub source_page: String,
    pub surrounding: Option<String>,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub mime: Option<String>,
    pub last_seen: String,
}

impl ImageRecord {
    /// A freshly discovered image with unresolved metadata
    pub fn discovered(url: String, source_page: String, last_seen: String) -> Self {
        Self {
            url,
            alt: None,
            source_page,
            surrounding: None,
            file_size: 0,
            width: 0,
            height: 0,
            mime: None,
            last_seen,
        }
    }
}

/// Resolved metadata patched onto an image record after a download
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub alt: String,
    pub surrounding: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub mime: String,
}

/// Aggregate counts read by the backpressure controller and stats display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    /// Pages with no `last_crawled` yet
    pub pending_pages: u64,

    /// Pages crawled and finalized with status 200
    pub visited_pages: u64,

    /// Images not marked unsupported
    pub resolved_images: u64,

    /// Images with a successful download on disk
    pub cached_images: u64,
}
