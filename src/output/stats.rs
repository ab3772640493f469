//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{RunRecord, Storage, StorageResult};

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Record table the statistics were read from
    pub table: String,

    /// Number of stored records
    pub total_records: u64,

    /// Most recent run, if any run was recorded
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `table` - The record table
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage, table: &str) -> StorageResult<HarvestStatistics> {
    Ok(HarvestStatistics {
        table: table.to_string(),
        total_records: storage.count_records(table)?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Renders statistics as the text printed by `--stats`
pub fn format_statistics(stats: &HarvestStatistics) -> String {
    let mut out = String::from("=== Harvest Statistics ===\n\n");
    out.push_str(&format!(
        "Records in '{}': {}\n",
        stats.table, stats.total_records
    ));

    match &stats.latest_run {
        None => out.push_str("\nNo harvest runs recorded\n"),
        Some(run) => {
            out.push_str(&format!("\nLatest run #{}:\n", run.id));
            out.push_str(&format!("  Status: {}\n", run.status.to_db_string()));
            out.push_str(&format!("  Started: {}\n", run.started_at));
            out.push_str(&format!(
                "  Finished: {}\n",
                run.finished_at.as_deref().unwrap_or("-")
            ));
            out.push_str(&format!(
                "  Stop reason: {}\n",
                run.stop_reason.as_deref().unwrap_or("-")
            ));
            out.push_str(&format!(
                "  Pages: {} done, {} failed\n",
                run.pages_done, run.pages_failed
            ));
            out.push_str(&format!(
                "  Records: {} seen, {} inserted\n",
                run.records_seen, run.records_inserted
            ));
            out.push_str(&format!("  Config hash: {}\n", run.config_hash));
        }
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &HarvestStatistics) {
    print!("{}", format_statistics(stats));
}
