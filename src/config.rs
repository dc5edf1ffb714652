//! Crawler configuration
//!
//! All tunable limits live here. Defaults match the values the crawler has
//! always shipped with; an optional TOML file can override any of them.

use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::path::Path;

/// Hard cap on the worker count, regardless of what the operator asks for.
pub const MAX_WORKERS: usize = 100;

/// Sentinel mime value marking an image as permanently rejected.
pub const UNSUPPORTED_MIME: &str = "unsupported";

/// Status code recorded for pages that have not been fetched yet.
pub const PENDING_STATUS: u16 = 100;

/// Synthetic status recorded when a fetch or parse blows up mid-flight.
pub const FAILURE_STATUS: u16 = 503;

/// Crawler limits and paths
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Path to the durable SQLite metadata store
    pub database_path: String,

    /// Root directory of the on-disk image blob cache
    pub cache_dir: String,

    /// Images larger than this (either axis) are resized down to it
    pub max_image_dims: u32,

    /// Downloads smaller than this many bytes are rejected
    pub min_image_file_size: usize,

    /// Downloads larger than this many bytes are rejected
    pub max_image_file_size: usize,

    /// Pending-page count at which URL discovery auto-suspends
    pub queue_threshold_max: u64,

    /// Pending-page count below which discovery resumes
    pub queue_threshold_min: u64,

    /// Character budget for alt and surrounding text
    pub max_str_length: usize,

    /// URLs at or above this length are rejected outright
    pub max_url_length: usize,

    /// HTML bodies are truncated to this many bytes before parsing
    pub max_page_size: usize,

    /// Seconds between prune/flush passes
    pub auto_flush_secs: u64,

    /// Connect timeout for every request, milliseconds
    pub connect_timeout_ms: u64,

    /// Read timeout for page fetches, milliseconds
    pub page_timeout_ms: u64,

    /// Read timeout for image downloads, milliseconds
    pub image_timeout_ms: u64,

    /// User-agent header sent with every request
    pub user_agent: String,

    /// JPEG quality used when re-encoding cached images
    pub jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "queues.db".to_string(),
            cache_dir: "img_cache".to_string(),
            max_image_dims: 1280,
            min_image_file_size: 200,
            max_image_file_size: 4 * 1024 * 1024,
            queue_threshold_max: 50_000,
            queue_threshold_min: 2_000,
            max_str_length: 1024,
            max_url_length: 450,
            max_page_size: 2 * 1024 * 1024,
            auto_flush_secs: 5 * 60,
            connect_timeout_ms: 2500,
            page_timeout_ms: 5500,
            image_timeout_ms: 8500,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3"
                .to_string(),
            jpeg_quality: 90,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file and validates it
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the limits are internally consistent
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_threshold_min >= self.queue_threshold_max {
            return Err(ConfigError::Validation(format!(
                "queue-threshold-min ({}) must be below queue-threshold-max ({})",
                self.queue_threshold_min, self.queue_threshold_max
            )));
        }
        if self.min_image_file_size >= self.max_image_file_size {
            return Err(ConfigError::Validation(format!(
                "min-image-file-size ({}) must be below max-image-file-size ({})",
                self.min_image_file_size, self.max_image_file_size
            )));
        }
        if self.max_image_dims == 0 {
            return Err(ConfigError::Validation(
                "max-image-dims must be non-zero".to_string(),
            ));
        }
        if self.max_url_length == 0 || self.max_str_length == 0 {
            return Err(ConfigError::Validation(
                "max-url-length and max-str-length must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Options chosen on the command line for a single run
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Mirror the in-memory catalog to disk on every flush pass
    pub auto_flush: bool,

    /// Operator override: never add newly discovered URLs
    pub no_new_urls: bool,

    /// Seconds between stats refreshes
    pub refresh_secs: u64,

    /// Number of crawl workers (already capped at [`MAX_WORKERS`])
    pub workers: usize,

    /// Seed URL inserted into the catalog at startup
    pub start_url: Option<String>,
}
