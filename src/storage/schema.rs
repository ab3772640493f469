//! Database schema definitions
//!
//! The `runs` table is fixed. The record table name comes from configuration,
//! so its DDL is rendered per table after the name has been validated.

/// SQL schema for run bookkeeping
pub const RUNS_SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    stop_reason TEXT,
    pages_done INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    records_seen INTEGER NOT NULL DEFAULT 0,
    records_inserted INTEGER NOT NULL DEFAULT 0
);
"#;

/// Returns true if `name` can be spliced into SQL as a table identifier
///
/// Accepts ASCII letters, digits and underscores, not starting with a digit.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders the DDL for a record table
///
/// `name` is declared `UNIQUE` so concurrent writers of the same key cannot
/// both insert, even though inserts also check for existence first.
pub fn records_table_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    image_url TEXT NOT NULL DEFAULT '',
    locations TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    source_url TEXT NOT NULL DEFAULT '',
    website_url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);
"#
    )
}

/// Initializes the run bookkeeping schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(RUNS_SCHEMA_SQL)?;
    Ok(())
}

/// Creates a record table if it does not exist yet
///
/// Callers must check the name with [`is_valid_table_name`] first.
pub fn initialize_records_table(
    conn: &rusqlite::Connection,
    table: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&records_table_sql(table))?;
    Ok(())
}
