//! Snapspider: a multi-threaded image-harvesting web crawler
//!
//! This crate implements a crawler that discovers pages by following
//! hyperlinks, extracts and deduplicates embedded images, downloads and
//! normalizes those images, and maintains a durable catalog of both pages
//! and images across runs.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod crawler;
pub mod images;
pub mod output;
pub mod state;
pub mod storage;
pub mod text;
pub mod url;

use thiserror::Error;

/// Main error type for snapspider operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Startup error: {0}")]
    Startup(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for snapspider operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::Config;
pub use state::RunFlags;
pub use crate::url::{canonicalize, UrlTarget};
