//! Crawler coordinator - main harvest orchestration logic
//!
//! This module wires the pieces of a harvest together:
//! - Building the HTTP client, fetcher and extractor from configuration
//! - Opening the database pool and recording a run row
//! - Fetching the session token before anything is dispatched
//! - Running the scheduler and finishing the run with its counters

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, HttpFetcher, PageFetcher};
use crate::crawler::offsets::OffsetSequence;
use crate::crawler::parser::HtmlExtractor;
use crate::crawler::scheduler::CrawlScheduler;
use crate::crawler::task::CrawlContext;
use crate::state::{CrawlCounters, CrawlState, StopReason};
use crate::storage::{open_pool, with_storage, RunStatus, SqliteSink, SqlitePool, Storage};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a finished harvest reports back to the caller
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub run_id: i64,
    pub stop_reason: StopReason,
    pub counters: CrawlCounters,
    pub elapsed: Duration,
}

impl CrawlSummary {
    /// True when the harvest ended the way a complete harvest should
    pub fn is_success(&self) -> bool {
        self.stop_reason.is_natural()
    }
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    pool: SqlitePool,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<HtmlExtractor>,
}

impl Coordinator {
    /// Creates a coordinator talking to the configured site over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The validated harvester configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Client, extractor and database pool are ready
    /// * `Err(HarvestError)` - Any of them could not be built
    pub fn new(config: Config, config_hash: String) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.http)?;
        let fetcher = HttpFetcher::new(client, &config)?;
        Self::with_fetcher(config, config_hash, Arc::new(fetcher))
    }

    /// Creates a coordinator around an existing fetcher
    pub fn with_fetcher(
        config: Config,
        config_hash: String,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, HarvestError> {
        let extractor = HtmlExtractor::from_config(&config)?;
        let pool = open_pool(Path::new(&config.database.path), config.pool_size())?;

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            pool,
            fetcher,
            extractor: Arc::new(extractor),
        })
    }

    /// Runs the harvest to completion
    ///
    /// Fails without dispatching any page when the session token cannot be
    /// obtained or the run cannot be recorded. Page-level failures never make
    /// this return an error; they show up in the summary counters.
    pub async fn run(&self) -> Result<CrawlSummary, HarvestError> {
        let started = Instant::now();
        let site = &self.config.site;

        tracing::info!("Fetching session token from {}", site.landing_url);
        let token = self
            .fetcher
            .fetch_token()
            .await
            .map_err(|source| HarvestError::TokenUnavailable {
                url: site.landing_url.clone(),
                source,
            })?;
        tracing::debug!("Session token obtained ({} chars)", token.len());

        let table = self.config.database.table.clone();
        let hash = self.config_hash.clone();
        let run_id = with_storage(&self.pool, move |storage| {
            storage.ensure_table(&table)?;
            storage.create_run(&hash)
        })
        .await?;
        tracing::info!("Starting harvest run {}", run_id);

        let state = Arc::new(CrawlState::new(
            token,
            self.config.crawler.concurrency as usize,
        ));
        let ctx = CrawlContext {
            fetcher: Arc::clone(&self.fetcher),
            extractor: self.extractor.clone(),
            sink: Arc::new(SqliteSink::new(self.pool.clone())),
            state,
            table: self.config.database.table.clone(),
            enrich_limit: self.config.enrich_concurrency() as usize,
        };
        let offsets = OffsetSequence::new(
            self.config.crawler.page_stride,
            self.config.crawler.max_offset,
        );

        let report = CrawlScheduler::new(ctx, offsets).run().await;

        let status = if report.stop_reason.is_natural() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        let counters = report.counters.clone();
        let reason = report.stop_reason.to_db_string();
        with_storage(&self.pool, move |storage| {
            storage.finish_run(run_id, status, Some(reason), &counters)
        })
        .await?;

        let summary = CrawlSummary {
            run_id,
            stop_reason: report.stop_reason,
            counters: report.counters,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Harvest run {} finished ({}): {} pages done, {} failed, {} records seen, {} inserted in {:?}",
            run_id,
            summary.stop_reason,
            summary.counters.pages_done,
            summary.counters.pages_failed,
            summary.counters.records_seen,
            summary.counters.records_inserted,
            summary.elapsed
        );

        Ok(summary)
    }
}

/// Runs a complete harvest
///
/// This function orchestrates the entire harvest:
///
/// 1. Build the HTTP client and open the database pool
/// 2. Fetch the session token from the landing page
/// 3. Record a new run
/// 4. Dispatch listing pages until end of data, first-page failure or the offset cap
/// 5. Finish the run with its stop reason and counters
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration file
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The harvest ran; check `is_success` for how it ended
/// * `Err(HarvestError)` - Startup failed before any page was dispatched
///
/// # Example
///
/// ```no_run
/// use listing_harvester::config::load_config_with_hash;
/// use listing_harvester::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvester.toml"))?;
/// let summary = run_crawl(config, hash).await?;
/// println!("stopped: {}", summary.stop_reason);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: String) -> crate::Result<CrawlSummary> {
    let coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}
