//! SQLite connection pool
//!
//! Checkout and return are r2d2's. This module prepares the database file
//! once and applies the per-connection settings every pooled connection needs.

use crate::storage::schema::initialize_schema;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{StorageError, StorageResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Pool of connections to one SQLite database file
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a checkout waits for a free connection
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    // Several pooled connections write to the same file
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )
}

/// Opens a pool of `size` connections to the database at `path`
///
/// The file is created if needed and switched to WAL with the run schema in
/// place before the pool exists. A bad path therefore fails here, at startup,
/// rather than on the first persist.
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
/// * `size` - Maximum number of connections, at least 1
pub fn open_pool(path: &Path, size: u32) -> StorageResult<SqlitePool> {
    if size == 0 {
        return Err(StorageError::InvalidPoolSize(size));
    }

    {
        // Journal mode is stored in the file, so one connection sets it for all
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        initialize_schema(&conn)?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|conn| configure_connection(conn));
    let pool = Pool::builder()
        .max_size(size)
        .connection_timeout(CHECKOUT_TIMEOUT)
        .build(manager)?;

    tracing::debug!("Opened {} database connections to {}", size, path.display());
    Ok(pool)
}

/// Single-connection pool over a private in-memory database
#[cfg(test)]
pub(crate) fn memory_pool() -> StorageResult<SqlitePool> {
    // Each in-memory connection is a separate database, so there is exactly one
    let manager = SqliteConnectionManager::memory().with_init(|conn| initialize_schema(conn));
    Ok(Pool::builder().max_size(1).build(manager)?)
}

/// Runs blocking database work on one pooled connection
///
/// Both the checkout and `work` run on tokio's blocking thread pool, so a
/// caller waiting for a free connection never stalls the async workers.
pub async fn with_storage<T, F>(pool: &SqlitePool, work: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteStorage) -> StorageResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut storage = SqliteStorage::checkout(&pool)?;
        work(&mut storage)
    })
    .await
    .map_err(|e| StorageError::TaskJoin(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn test_zero_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_pool(&dir.path().join("pool.db"), 0);
        assert!(matches!(result, Err(StorageError::InvalidPoolSize(0))));
    }

    #[test]
    fn test_missing_directory_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_pool(&dir.path().join("missing").join("pool.db"), 2);
        assert!(matches!(result, Err(StorageError::Sqlite(_))));
    }

    #[test]
    fn test_pool_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("pool.db"), 2).unwrap();
        assert_eq!(pool.max_size(), 2);

        let first = pool.get().unwrap();
        let second = pool.get().unwrap();
        assert!(pool.try_get().is_none(), "a third checkout must wait");

        drop(first);
        assert!(pool.try_get().is_some());
        drop(second);
    }

    #[test]
    fn test_database_is_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("pool.db"), 1).unwrap();

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_connections_share_database() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("pool.db"), 2).unwrap();

        let mut writer = SqliteStorage::checkout(&pool).unwrap();
        let run_id = writer.create_run("hash").unwrap();
        let reader = SqliteStorage::checkout(&pool).unwrap();
        let latest = reader.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, run_id);
    }

    #[tokio::test]
    async fn test_with_storage_runs_work() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("pool.db"), 1).unwrap();

        let run_id = with_storage(&pool, |storage| storage.create_run("hash"))
            .await
            .unwrap();
        let latest = with_storage(&pool, |storage| storage.get_latest_run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, run_id);
    }
}
