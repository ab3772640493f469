//! Storage traits and error types
//!
//! This module defines the trait interfaces for storage backends and
//! associated error types.

use crate::record::Record;
use crate::state::CrawlCounters;
use crate::storage::{PersistOutcome, RunRecord, RunStatus};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Invalid pool size: {0}")]
    InvalidPoolSize(u32),

    #[error("Blocking storage task failed: {0}")]
    TaskJoin(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for synchronous storage backends
///
/// One implementation owns one database connection. Concurrent callers check
/// out their own from a [`crate::storage::SqlitePool`] instead of sharing an instance.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run finished with its final status and counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        stop_reason: Option<&str>,
        counters: &CrawlCounters,
    ) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts `record` unless a row with the same name exists
    ///
    /// Returns true if a row was inserted.
    fn insert_if_absent(&mut self, table: &str, record: &Record) -> StorageResult<bool>;

    /// Counts stored records
    fn count_records(&self, table: &str) -> StorageResult<u64>;
}

/// Asynchronous insert-if-absent sink for harvested records
///
/// Rows are only ever added. A record whose name is already stored is skipped.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn persist(&self, table: &str, records: &[Record]) -> StorageResult<PersistOutcome>;
}
