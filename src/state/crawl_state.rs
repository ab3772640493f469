use crate::state::StopReason;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Process-wide crawl state shared by the scheduler and its tasks
///
/// The in-flight counter and the stop flag are the only mutable shared state of
/// a crawl. The session token is set once at construction and never changes.
#[derive(Debug)]
pub struct CrawlState {
    /// Session token sent with every listing request
    token: String,

    /// Configured concurrency ceiling
    ceiling: usize,

    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,

    /// Fast-path copy of `stop_reason.is_some()`
    stopped: AtomicBool,
    stop_reason: Mutex<Option<StopReason>>,

    pages_dispatched: AtomicU64,
    pages_done: AtomicU64,
    pages_failed: AtomicU64,
    records_seen: AtomicU64,
    records_inserted: AtomicU64,
    persist_failures: AtomicU64,
}

/// Point-in-time copy of the crawl counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    pub pages_dispatched: u64,
    pub pages_done: u64,
    pub pages_failed: u64,
    pub records_seen: u64,
    pub records_inserted: u64,
    pub persist_failures: u64,
    pub peak_in_flight: usize,
}

impl CrawlState {
    pub fn new(token: String, ceiling: usize) -> Self {
        Self {
            token,
            ceiling,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            stop_reason: Mutex::new(None),
            pages_dispatched: AtomicU64::new(0),
            pages_done: AtomicU64::new(0),
            pages_failed: AtomicU64::new(0),
            records_seen: AtomicU64::new(0),
            records_inserted: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Records a dispatched task and returns the new in-flight count
    pub fn task_dispatched(&self) -> usize {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.pages_dispatched.fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            now <= self.ceiling,
            "in-flight count {} exceeds ceiling {}",
            now,
            self.ceiling
        );
        now
    }

    /// Records a finished task and returns the new in-flight count
    pub fn task_finished(&self) -> usize {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sets the stop flag
    ///
    /// Returns true only for the call that performed the false→true transition;
    /// later calls keep the first reason.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        let mut guard = self
            .stop_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_some() {
            return false;
        }
        *guard = Some(reason);
        self.stopped.store(true, Ordering::SeqCst);
        true
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        *self
            .stop_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_page_done(&self, records: usize, inserted: usize) {
        self.pages_done.fetch_add(1, Ordering::Relaxed);
        self.records_seen.fetch_add(records as u64, Ordering::Relaxed);
        self.records_inserted
            .fetch_add(inserted as u64, Ordering::Relaxed);
    }

    pub fn record_page_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self, records: usize) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
        self.records_seen.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn counters(&self) -> CrawlCounters {
        CrawlCounters {
            pages_dispatched: self.pages_dispatched.load(Ordering::Relaxed),
            pages_done: self.pages_done.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            records_seen: self.records_seen.load(Ordering::Relaxed),
            records_inserted: self.records_inserted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight(),
        }
    }
}
