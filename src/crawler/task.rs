//! Page task pipeline: fetch → extract → enrich → persist
//!
//! One task handles one offset. Tasks never retry and never panic the
//! scheduler: every way a task can end is reported as a [`TaskOutcome`].

use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::parser::{ExtractError, RecordExtractor};
use crate::record::{PartialRecord, Record};
use crate::state::{CrawlState, TaskState};
use crate::storage::{PersistenceSink, StorageError};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;

/// Everything a task needs, shared by all tasks of one crawl
pub struct CrawlContext {
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractor: Arc<dyn RecordExtractor>,
    pub sink: Arc<dyn PersistenceSink>,
    pub state: Arc<CrawlState>,

    /// Table receiving the harvested records
    pub table: String,

    /// Detail pages one task fetches at once
    pub enrich_limit: usize,
}

/// Why a task ended in [`TaskState::Failed`]
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("listing answered with HTTP {0}")]
    Status(u16),

    #[error("unexpected listing payload: {0}")]
    Extract(#[from] ExtractError),

    #[error("could not persist {records} records: {error}")]
    Persist {
        records: usize,
        #[source]
        error: StorageError,
    },

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskFailure {
    /// True for failures that mean the listing page itself could not be read
    pub fn is_page_unreadable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Status(_) | Self::Extract(_))
    }
}

/// Terminal result of one task
#[derive(Debug)]
pub enum TaskOutcome {
    /// The page was read; `records == 0` means a well-formed empty page
    Done {
        records: usize,
        inserted: usize,
        skipped: usize,

        /// Records stored without a website because enrichment found none
        enrichment_misses: usize,
    },

    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            Self::Done { .. } => TaskState::Done,
            Self::Failed(_) => TaskState::Failed,
        }
    }

    /// True for a page that was fetched and parsed but held no records
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::Done { records: 0, .. })
    }
}

/// Message sent from a finished task to the scheduler
///
/// The concurrency permit travels with the message and is released only after
/// the scheduler has handled the completion.
pub struct TaskCompletion {
    pub offset: u64,
    pub outcome: TaskOutcome,
    pub permit: OwnedSemaphorePermit,
}

/// Runs the whole pipeline for one offset
pub async fn run_task(ctx: &CrawlContext, offset: u64) -> TaskOutcome {
    match harvest_page(ctx, offset).await {
        Ok(outcome) => outcome,
        Err(failure) => TaskOutcome::Failed(failure),
    }
}

async fn harvest_page(ctx: &CrawlContext, offset: u64) -> Result<TaskOutcome, TaskFailure> {
    let page = ctx
        .fetcher
        .fetch_listing_page(offset, ctx.state.token())
        .await?;

    if !page.is_success() {
        return Err(TaskFailure::Status(page.status));
    }

    let partials = ctx.extractor.extract_records(&page.body)?;
    if partials.is_empty() {
        return Ok(TaskOutcome::Done {
            records: 0,
            inserted: 0,
            skipped: 0,
            enrichment_misses: 0,
        });
    }

    tracing::debug!("Offset {}: enriching {} records", offset, partials.len());
    let records = enrich_all(
        ctx.fetcher.as_ref(),
        ctx.extractor.as_ref(),
        partials,
        ctx.enrich_limit,
    )
    .await;
    let enrichment_misses = records.iter().filter(|r| r.website_url.is_empty()).count();

    let outcome = ctx
        .sink
        .persist(&ctx.table, &records)
        .await
        .map_err(|error| TaskFailure::Persist {
            records: records.len(),
            error,
        })?;

    Ok(TaskOutcome::Done {
        records: records.len(),
        inserted: outcome.inserted,
        skipped: outcome.skipped,
        enrichment_misses,
    })
}

/// Enriches every record of a page, at most `limit` lookups at a time
///
/// Order is preserved. All lookups finish before this returns.
pub async fn enrich_all(
    fetcher: &dyn PageFetcher,
    extractor: &dyn RecordExtractor,
    partials: Vec<PartialRecord>,
    limit: usize,
) -> Vec<Record> {
    stream::iter(partials)
        .map(|partial| async move {
            let website_url = enrich(fetcher, extractor, &partial.source_url).await;
            partial.complete(website_url)
        })
        .buffered(limit.max(1))
        .collect()
        .await
}

/// Looks up the external site URL on a detail page
///
/// Any failure yields an empty string.
pub async fn enrich(
    fetcher: &dyn PageFetcher,
    extractor: &dyn RecordExtractor,
    detail_url: &str,
) -> String {
    if detail_url.is_empty() {
        return String::new();
    }

    match fetcher.fetch_detail_page(detail_url).await {
        Ok(html) => extractor.extract_site_url(&html),
        Err(e) => {
            tracing::debug!("Enrichment failed for {}: {}", detail_url, e);
            String::new()
        }
    }
}
