//! Crawler module for paginated listing harvesting
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching of the token, listing pages and detail pages
//! - Record extraction from the listing payload
//! - Offset generation and bounded-concurrency scheduling
//! - Overall harvest coordination

mod coordinator;
mod fetcher;
mod offsets;
mod parser;
mod scheduler;
mod task;

pub use coordinator::{run_crawl, Coordinator, CrawlSummary};
pub use fetcher::{
    build_http_client, listing_headers, session_headers, FetchError, HttpFetcher, PageFetcher,
    RawPage,
};
pub use offsets::OffsetSequence;
pub use parser::{extract_token, ExtractError, HtmlExtractor, RecordExtractor};
pub use scheduler::{CrawlScheduler, SchedulerReport};
pub use task::{enrich, enrich_all, run_task, CrawlContext, TaskFailure, TaskOutcome};

use crate::config::Config;

/// Runs a complete harvest
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Open the database pool and build the HTTP client
/// 2. Fetch the session token
/// 3. Record a harvest run
/// 4. Dispatch listing pages up to the concurrency ceiling
/// 5. Finish the run with its stop reason
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration file
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Harvest ran to a stop condition
/// * `Err(HarvestError)` - Startup failed
pub async fn crawl(config: Config, config_hash: String) -> crate::Result<CrawlSummary> {
    run_crawl(config, config_hash).await
}
