//! Listing Harvester: a bounded-concurrency harvester for paginated listings
//!
//! This crate walks a paginated remote listing page by page, extracts the
//! entities on each page, enriches every entity with one detail-page lookup
//! and stores the result once per entity name.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not obtain session token from {url}: {source}")]
    TokenUnavailable {
        url: String,
        source: crawler::FetchError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Config file {0} not found; create it with a [site] section that sets landing-url and listing-url"
    )]
    NotFound(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, CrawlSummary};
pub use record::{PartialRecord, Record};
pub use state::{CrawlState, StopReason, TaskState};
