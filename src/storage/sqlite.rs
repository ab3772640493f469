//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::Record;
use crate::state::CrawlCounters;
use crate::storage::pool::{open_pool, SqlitePool};
use crate::storage::schema::{initialize_records_table, is_valid_table_name};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{PersistOutcome, RunRecord, RunStatus};
use chrono::Utc;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::collections::HashSet;
use std::path::Path;

/// SQLite storage backend holding one pooled connection
///
/// The connection goes back to its pool when the storage is dropped.
pub struct SqliteStorage {
    conn: PooledConnection<SqliteConnectionManager>,

    /// Record tables already created through this connection
    known_tables: HashSet<String>,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        Self::checkout(&open_pool(path, 1)?)
    }

    /// Checks out a connection from `pool`, blocking until one is free
    pub fn checkout(pool: &SqlitePool) -> StorageResult<Self> {
        Ok(Self {
            conn: pool.get()?,
            known_tables: HashSet::new(),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        Self::checkout(&crate::storage::pool::memory_pool()?)
    }

    /// Creates the record table on first use through this connection
    pub fn ensure_table(&mut self, table: &str) -> StorageResult<()> {
        if self.known_tables.contains(table) {
            return Ok(());
        }
        checked_table(table)?;
        initialize_records_table(&self.conn, table)?;
        self.known_tables.insert(table.to_string());
        Ok(())
    }

    /// Inserts a batch, one transaction per record
    ///
    /// Stops at the first database error; rows inserted before it stay stored.
    pub fn persist_batch(&mut self, table: &str, records: &[Record]) -> StorageResult<PersistOutcome> {
        self.ensure_table(table)?;

        let mut outcome = PersistOutcome::default();
        for record in records {
            if self.insert_if_absent(table, record)? {
                outcome.inserted += 1;
            } else {
                tracing::debug!("Skipping already stored record '{}'", record.name);
                outcome.skipped += 1;
            }
        }
        Ok(outcome)
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status, stop_reason,
             pages_done, pages_failed, records_seen, records_inserted
             FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                    stop_reason: row.get(5)?,
                    pages_done: row.get(6)?,
                    pages_failed: row.get(7)?,
                    records_seen: row.get(8)?,
                    records_inserted: row.get(9)?,
                })
            })
            .optional()?;

        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        stop_reason: Option<&str>,
        counters: &CrawlCounters,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, stop_reason = ?3,
             pages_done = ?4, pages_failed = ?5, records_seen = ?6, records_inserted = ?7
             WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                stop_reason,
                counters.pages_done as i64,
                counters.pages_failed as i64,
                counters.records_seen as i64,
                counters.records_inserted as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Records =====

    fn insert_if_absent(&mut self, table: &str, record: &Record) -> StorageResult<bool> {
        checked_table(table)?;

        // IMMEDIATE takes the write lock up front so the check and the insert
        // see the same database state
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            &format!(r#"SELECT EXISTS(SELECT 1 FROM "{}" WHERE name = ?1)"#, table),
            params![record.name],
            |row| row.get(0),
        )?;

        if exists {
            tx.commit()?;
            return Ok(false);
        }

        let inserted = tx.execute(
            &format!(
                r#"INSERT INTO "{}" (name, image_url, locations, description, source_url, website_url, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                   ON CONFLICT(name) DO NOTHING"#,
                table
            ),
            params![
                record.name,
                record.image_url,
                record.locations_joined(),
                record.description,
                record.source_url,
                record.website_url,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        Ok(inserted > 0)
    }

    fn count_records(&self, table: &str) -> StorageResult<u64> {
        checked_table(table)?;

        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(0);
        }

        let count: i64 = self.conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{}""#, table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn checked_table(table: &str) -> StorageResult<()> {
    if is_valid_table_name(table) {
        Ok(())
    } else {
        Err(StorageError::InvalidTable(table.to_string()))
    }
}
