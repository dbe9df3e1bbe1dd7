//! Replay Queue: critical operations submitted while offline
//!
//! A critical spec that arrives while the link is down is parked here. When
//! connectivity returns the whole queue is taken in one step and every entry
//! is replayed concurrently through the executor's retry loop.
//!
//! # Replay outcomes
//!
//! - success: the entry is forgotten
//! - transient failure with replay budget left: re-queued for the next
//!   reconnect (keeps its id)
//! - permanent failure, or budget spent: moved to the dead-letter queue
//!
//! The caller that submitted the operation already got its result; replays
//! are fire-and-forget unless the [`ReplayDispatch`] is awaited.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ReplayConfig;
use crate::executor::ResilientExecutor;
use crate::operation::{ExecutionResult, OperationSpec};
use tether_core_resilience::{
    BufferedEntry, DeadLetterEntry, DeadLetterQueue, DeadLetterStats, FailureReason,
    ReplayBuffer, ReplayBufferStats, ReplayId, ResilienceError,
};

type ReplayFn = Arc<dyn Fn(ResilientExecutor) -> BoxFuture<'static, ReplayOutcome> + Send + Sync>;

/// Type-erased queued operation
#[derive(Clone)]
pub struct QueuedOperation {
    label: String,
    replay: ReplayFn,
}

impl QueuedOperation {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for QueuedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedOperation")
            .field("label", &self.label)
            .finish()
    }
}

/// A queued operation with its bookkeeping
pub type QueueEntry = BufferedEntry<QueuedOperation>;

/// Result of one replay, without the payload
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub success: bool,
    pub error: Option<ResilienceError>,
    pub retries_used: u32,
}

impl<T> From<&ExecutionResult<T>> for ReplayOutcome {
    fn from(result: &ExecutionResult<T>) -> Self {
        Self {
            success: result.success,
            error: result.error.clone(),
            retries_used: result.retries_used,
        }
    }
}

/// What happened to an entry after its replay settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDisposition {
    Completed,
    Requeued,
    DeadLettered,
}

/// Report for one replayed entry
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub id: ReplayId,
    pub label: String,
    pub outcome: ReplayOutcome,
    pub disposition: ReplayDisposition,
}

/// Handles of the replays started by one drain.
///
/// Dropping it leaves the replays running.
#[derive(Debug, Default)]
pub struct ReplayDispatch {
    pub ids: Vec<ReplayId>,
    handles: Vec<JoinHandle<ReplayReport>>,
}

impl ReplayDispatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Wait for every replay of this drain to settle
    pub async fn join(self) -> Vec<ReplayReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Replay task did not complete"),
            }
        }
        reports
    }
}

/// Counters for the replay queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    pub buffer: ReplayBufferStats,
    pub dead_letters: DeadLetterStats,
}

/// Offline queue of critical operations
#[derive(Debug)]
pub struct ReplayQueue {
    buffer: Mutex<ReplayBuffer<QueuedOperation>>,
    dead_letters: Mutex<DeadLetterQueue>,
    max_replays: u32,
    /// A reconnect happened with no runtime to replay on
    drain_deferred: AtomicBool,
}

impl ReplayQueue {
    pub fn new(config: &ReplayConfig) -> Self {
        Self {
            buffer: Mutex::new(ReplayBuffer::new(config.capacity)),
            dead_letters: Mutex::new(DeadLetterQueue::new(config.dead_letter_capacity)),
            max_replays: config.max_replays,
            drain_deferred: AtomicBool::new(false),
        }
    }

    fn buffer(&self) -> std::sync::MutexGuard<'_, ReplayBuffer<QueuedOperation>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dead_letters(&self) -> std::sync::MutexGuard<'_, DeadLetterQueue> {
        self.dead_letters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `spec` until connectivity returns. Its fallback is not kept:
    /// nobody is waiting for a replayed value.
    pub fn enqueue<T: Send + 'static>(&self, spec: OperationSpec<T>) -> ReplayId {
        let spec = spec.without_fallback();
        let label = spec.label.clone();

        let replay: ReplayFn = Arc::new(
            move |executor: ResilientExecutor| -> BoxFuture<'static, ReplayOutcome> {
                let spec = spec.clone();
                Box::pin(async move {
                    let result = executor.replay(spec).await;
                    ReplayOutcome::from(&result)
                })
            },
        );

        let (id, evicted) = self.buffer().push(QueuedOperation {
            label: label.clone(),
            replay,
        });
        info!(replay_id = %id, op = %label, "Queued operation for replay");

        if let Some(evicted) = evicted {
            self.evict(evicted);
        }
        id
    }

    /// Take every entry and replay each one concurrently.
    ///
    /// The queue is empty when this returns. Replays run on the caller's
    /// runtime, or the one the executor was built on. With neither, the
    /// entries stay queued and the next online `execute` drains them.
    pub fn drain(&self, executor: &ResilientExecutor) -> ReplayDispatch {
        let Some(runtime) = executor.runtime() else {
            self.drain_deferred.store(true, Ordering::SeqCst);
            warn!(queued = self.len(), "No async runtime; replay deferred");
            return ReplayDispatch::default();
        };
        self.drain_deferred.store(false, Ordering::SeqCst);

        let entries = self.buffer().take_all();
        if entries.is_empty() {
            return ReplayDispatch::default();
        }
        info!(count = entries.len(), "Draining replay queue");

        let mut dispatch = ReplayDispatch::default();
        for mut entry in entries {
            entry.replays += 1;
            dispatch.ids.push(entry.id);

            let executor = executor.clone();
            dispatch.handles.push(runtime.spawn(async move {
                debug!(
                    replay_id = %entry.id,
                    op = %entry.job.label,
                    replay = entry.replays,
                    "Replaying"
                );
                let outcome = (entry.job.replay)(executor.clone()).await;
                executor.replay_queue().settle(entry, outcome)
            }));
        }
        dispatch
    }

    /// Clear and return the deferred-drain flag
    pub(crate) fn take_deferred(&self) -> bool {
        self.drain_deferred.swap(false, Ordering::SeqCst)
    }

    /// A reconnect is waiting for a runtime to replay on
    pub fn is_drain_deferred(&self) -> bool {
        self.drain_deferred.load(Ordering::SeqCst)
    }

    /// Decide what happens to an entry after its replay finished
    pub(crate) fn settle(&self, entry: QueueEntry, outcome: ReplayOutcome) -> ReplayReport {
        let id = entry.id;
        let label = entry.job.label.clone();

        let disposition = match &outcome.error {
            _ if outcome.success => {
                info!(replay_id = %id, op = %label, "Replay succeeded");
                ReplayDisposition::Completed
            }
            Some(err @ ResilienceError::Cancelled) => {
                info!(replay_id = %id, op = %label, "Replay cancelled; not re-queued");
                let last_error = err.to_string();
                self.dead_letter(entry, FailureReason::Cancelled, last_error);
                ReplayDisposition::DeadLettered
            }
            Some(err) if err.is_transient() && entry.replays < self.max_replays => {
                info!(
                    replay_id = %id,
                    op = %label,
                    replays = entry.replays,
                    error = %err,
                    "Replay failed; re-queued"
                );
                if let Some(evicted) = self.buffer().requeue(entry) {
                    self.evict(evicted);
                }
                ReplayDisposition::Requeued
            }
            error => {
                let last_error = error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                let reason = match error {
                    Some(err) if err.is_permanent() => FailureReason::PermanentError,
                    _ => FailureReason::ReplaysExhausted {
                        replays: entry.replays,
                    },
                };
                self.dead_letter(entry, reason, last_error);
                ReplayDisposition::DeadLettered
            }
        };

        ReplayReport {
            id,
            label,
            outcome,
            disposition,
        }
    }

    fn evict(&self, entry: QueueEntry) {
        self.dead_letter(entry, FailureReason::Evicted, "replay queue full".to_string());
    }

    fn dead_letter(&self, entry: QueueEntry, reason: FailureReason, last_error: String) {
        self.dead_letters().push(DeadLetterEntry {
            replay_id: entry.id.as_u64(),
            label: entry.job.label,
            failure_reason: reason,
            last_error,
            enqueued_at: entry.enqueued_at,
            dead_lettered_at: SystemTime::now(),
        });
    }

    /// Number of operations waiting
    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    /// Ids waiting, oldest first
    pub fn ids(&self) -> Vec<ReplayId> {
        self.buffer().ids()
    }

    /// Remove and return the dead-lettered operations
    pub fn take_dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.dead_letters().drain()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters().len()
    }

    pub fn stats(&self) -> ReplayStats {
        ReplayStats {
            buffer: self.buffer().stats(),
            dead_letters: self.dead_letters().stats(),
        }
    }
}
