//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: lifecycle of one page task (pending, running, done, failed)
//! - `StopReason`: why the crawl stopped dispatching pages
//! - `CrawlState`: shared in-flight counter, stop flag, session token and counters

mod crawl_state;
mod task_state;

// Re-export main types
pub use crawl_state::{CrawlCounters, CrawlState};
pub use task_state::{StopReason, TaskState};
