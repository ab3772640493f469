//! Crawl scheduler: dispatch, throttling and termination
//!
//! This module handles:
//! - Pulling offsets from the lazy offset sequence
//! - Global concurrency limiting via a semaphore
//! - Serialized completion handling on the driver
//! - Setting the stop flag on end of data or an unusable first page
//!
//! A task never touches the in-flight counter or the stop flag itself. It sends
//! a [`TaskCompletion`] carrying its semaphore permit back to the driver, and
//! the permit is dropped only after the driver has handled the completion.

use crate::crawler::offsets::OffsetSequence;
use crate::crawler::task::{run_task, CrawlContext, TaskCompletion, TaskFailure, TaskOutcome};
use crate::state::{CrawlCounters, CrawlState, StopReason, TaskState};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Result of a finished scheduler run
#[derive(Debug, Clone)]
pub struct SchedulerReport {
    pub stop_reason: StopReason,

    /// Offsets in dispatch order
    pub dispatched: Vec<u64>,

    /// Highest offset dispatched at the moment the stop flag was set
    pub highest_at_stop: Option<u64>,

    /// Final state of every dispatched offset
    pub task_states: BTreeMap<u64, TaskState>,

    pub counters: CrawlCounters,
}

/// Dispatches page tasks up to the concurrency ceiling until told to stop
pub struct CrawlScheduler {
    ctx: Arc<CrawlContext>,
    offsets: OffsetSequence,
    permits: Arc<Semaphore>,

    /// Offset whose failure means the listing is unusable
    first_offset: u64,

    dispatched: Vec<u64>,
    highest_at_stop: Option<u64>,
    task_states: BTreeMap<u64, TaskState>,
}

impl CrawlScheduler {
    /// Creates a scheduler whose ceiling is taken from the context's crawl state
    pub fn new(ctx: CrawlContext, offsets: OffsetSequence) -> Self {
        let ceiling = ctx.state.ceiling().max(1);
        let mut offsets = offsets;
        offsets.restart();

        Self {
            ctx: Arc::new(ctx),
            offsets,
            permits: Arc::new(Semaphore::new(ceiling)),
            first_offset: 0,
            dispatched: Vec::new(),
            highest_at_stop: None,
            task_states: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &Arc<CrawlState> {
        &self.ctx.state
    }

    /// Runs the dispatch loop to completion
    ///
    /// Returns once the stop flag is set or the offsets are exhausted and
    /// every dispatched task has been handled.
    pub async fn run(mut self) -> SchedulerReport {
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskCompletion>();
        let mut tasks = JoinSet::new();

        tracing::info!(
            "Dispatching listing pages: ceiling {}, stride {}, cap {}",
            self.state().ceiling(),
            self.offsets.stride(),
            self.offsets.cap()
        );

        loop {
            while let Ok(completion) = rx.try_recv() {
                self.handle_completion(completion);
            }
            while tasks.try_join_next().is_some() {}

            if self.state().is_stopped() || self.offsets.is_exhausted() {
                break;
            }

            // Completions keep flowing while waiting for a free slot
            let permit = tokio::select! {
                biased;
                Some(completion) = rx.recv() => {
                    self.handle_completion(completion);
                    continue;
                }
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if self.state().is_stopped() {
                break;
            }
            let Some(offset) = self.offsets.next() else {
                break;
            };
            self.transition(offset, TaskState::Pending);

            let in_flight = self.state().task_dispatched();
            self.dispatched.push(offset);
            self.transition(offset, TaskState::Running);
            tracing::debug!("Dispatched offset {} ({} in flight)", offset, in_flight);

            let ctx = Arc::clone(&self.ctx);
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(run_task(&ctx, offset))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        TaskOutcome::Failed(TaskFailure::Panicked(panic_message(&*panic)))
                    });

                // The receiver outlives every task
                let _ = tx.send(TaskCompletion {
                    offset,
                    outcome,
                    permit,
                });
            });
        }

        drop(tx);
        tracing::debug!(
            "Dispatch finished, waiting for {} in-flight pages",
            self.state().in_flight()
        );
        while let Some(completion) = rx.recv().await {
            self.handle_completion(completion);
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Page task aborted: {}", e);
            }
        }

        let unfinished = self
            .task_states
            .values()
            .filter(|state| !state.is_terminal())
            .count();
        if unfinished > 0 {
            tracing::error!("{} dispatched pages never reported back", unfinished);
        }

        if self.state().request_stop(StopReason::OffsetCapReached) {
            self.highest_at_stop = self.dispatched.last().copied();
            tracing::warn!(
                "Offset cap {} reached before an empty page; the listing may have more data",
                self.offsets.cap()
            );
        }

        let stop_reason = self
            .state()
            .stop_reason()
            .unwrap_or(StopReason::OffsetCapReached);

        SchedulerReport {
            stop_reason,
            dispatched: self.dispatched,
            highest_at_stop: self.highest_at_stop,
            task_states: self.task_states,
            counters: self.ctx.state.counters(),
        }
    }

    fn handle_completion(&mut self, completion: TaskCompletion) {
        let TaskCompletion {
            offset,
            outcome,
            permit,
        } = completion;
        let state = Arc::clone(&self.ctx.state);
        let in_flight = state.task_finished();

        self.transition(offset, outcome.state());

        if outcome.is_end_of_data() {
            state.record_page_done(0, 0);
            if state.request_stop(StopReason::EndOfData { offset }) {
                self.highest_at_stop = self.dispatched.last().copied();
                tracing::info!(
                    "End of data: offset {} returned an empty page, no further pages will be dispatched",
                    offset
                );
            } else {
                tracing::debug!("Offset {}: empty page after stop", offset);
            }
            drop(permit);
            return;
        }

        match outcome {
            TaskOutcome::Done {
                records,
                inserted,
                skipped,
                enrichment_misses,
            } => {
                state.record_page_done(records, inserted);
                tracing::info!(
                    "Offset {}: {} records, {} inserted, {} already stored ({} in flight)",
                    offset,
                    records,
                    inserted,
                    skipped,
                    in_flight
                );
                if enrichment_misses > 0 {
                    tracing::debug!(
                        "Offset {}: {} records without a website",
                        offset,
                        enrichment_misses
                    );
                }
            }

            TaskOutcome::Failed(failure) => {
                state.record_page_failed();
                if let TaskFailure::Persist { records, .. } = &failure {
                    state.record_persist_failure(*records);
                }
                tracing::warn!("Offset {} failed: {}", offset, failure);

                if offset == self.first_offset
                    && failure.is_page_unreadable()
                    && state.request_stop(StopReason::FirstPageFailed)
                {
                    self.highest_at_stop = self.dispatched.last().copied();
                    tracing::error!("First listing page is unusable, stopping the crawl");
                }
            }
        }

        drop(permit);
    }

    /// Moves one offset through its task lifecycle
    fn transition(&mut self, offset: u64, next: TaskState) {
        match self.task_states.get(&offset).copied() {
            None if next == TaskState::Pending => {
                self.task_states.insert(offset, next);
            }
            Some(current) if current.can_transition_to(next) => {
                tracing::debug!("Offset {}: {} -> {}", offset, current, next);
                self.task_states.insert(offset, next);
            }
            current => {
                tracing::warn!(
                    "Offset {}: ignoring transition {:?} -> {}",
                    offset,
                    current,
                    next
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
