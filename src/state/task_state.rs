/// Task and run termination states
///
/// This module defines the lifecycle of one page task and the reasons a crawl can stop.
use std::fmt;

/// Lifecycle of a task bound to one page offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Offset chosen, task not yet dispatched
    Pending,

    /// Fetch, extract, enrich or persist in progress
    Running,

    /// Page was fetched and handled, including well-formed empty pages
    Done,

    /// Fetch, parse or persistence failed for this page
    Failed,
}

impl TaskState {
    /// Returns true if the task can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running) | (Self::Running, Self::Done) | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a crawl stopped dispatching new pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// A well-formed page with no entities was returned at this offset
    EndOfData { offset: u64 },

    /// The first page could not be fetched or parsed
    FirstPageFailed,

    /// The configured offset cap was reached before any empty page
    OffsetCapReached,
}

impl StopReason {
    /// Converts the reason to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::EndOfData { .. } => "end_of_data",
            Self::FirstPageFailed => "first_page_failed",
            Self::OffsetCapReached => "offset_cap_reached",
        }
    }

    /// Returns true when the crawl ended the way a complete crawl should
    pub fn is_natural(&self) -> bool {
        !matches!(self, Self::FirstPageFailed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfData { offset } => write!(f, "end of data at offset {}", offset),
            Self::FirstPageFailed => write!(f, "first page failed"),
            Self::OffsetCapReached => write!(f, "offset cap reached"),
        }
    }
}
