//! Output module for harvest summaries and statistics
//!
//! This module handles:
//! - Rendering the summary printed after a harvest
//! - Reading and printing database statistics for `--stats`

pub mod stats;

pub use stats::{format_statistics, load_statistics, print_statistics, HarvestStatistics};

use crate::crawler::CrawlSummary;

/// Renders the summary printed after a harvest finishes
pub fn format_summary(summary: &CrawlSummary) -> String {
    let c = &summary.counters;
    let mut out = format!(
        "=== Harvest Run #{} ===\n\nStopped: {}\nDuration: {:.1}s\n\n",
        summary.run_id,
        summary.stop_reason,
        summary.elapsed.as_secs_f64()
    );
    out.push_str(&format!(
        "Pages: {} dispatched, {} done, {} failed (peak {} in flight)\n",
        c.pages_dispatched, c.pages_done, c.pages_failed, c.peak_in_flight
    ));
    out.push_str(&format!(
        "Records: {} seen, {} inserted, {} already stored\n",
        c.records_seen,
        c.records_inserted,
        c.records_seen.saturating_sub(c.records_inserted)
    ));
    if c.persist_failures > 0 {
        out.push_str(&format!("Persist failures: {}\n", c.persist_failures));
    }
    out
}
