//! Configuration module for the harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use listing_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Harvesting with concurrency {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DatabaseConfig, HttpConfig, SelectorConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{
    hash_config_content, load_config, load_config_with_hash, parse_config,
};
pub use validation::{parse_selector, validate};
