//! Storage module for persisting harvested records
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - A fixed-size connection pool shared by concurrent page tasks
//! - Insert-if-absent persistence keyed on record name
//! - Run tracking

mod pool;
mod schema;
mod sqlite;
mod traits;

pub use pool::{open_pool, with_storage, SqlitePool};
pub use schema::is_valid_table_name;
pub use sqlite::SqliteStorage;
pub use traits::{PersistenceSink, Storage, StorageError, StorageResult};

use crate::record::Record;
use async_trait::async_trait;

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub stop_reason: Option<String>,
    pub pages_done: i64,
    pub pages_failed: i64,
    pub records_seen: i64,
    pub records_inserted: i64,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Result of persisting one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Records written as new rows
    pub inserted: usize,

    /// Records whose name was already stored
    pub skipped: usize,
}

/// Pool-backed [`PersistenceSink`]
///
/// Each `persist` call checks out one connection and runs the batch on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn persist(&self, table: &str, records: &[Record]) -> StorageResult<PersistOutcome> {
        if records.is_empty() {
            return Ok(PersistOutcome::default());
        }

        let table = table.to_string();
        let records = records.to_vec();

        with_storage(&self.pool, move |storage| storage.persist_batch(&table, &records)).await
    }
}
