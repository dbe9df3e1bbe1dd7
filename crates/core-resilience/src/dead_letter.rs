//! Dead-Letter Queue: quarantine for replays that will not be retried
//!
//! A queued operation that keeps failing after connectivity returns is
//! re-queued a bounded number of times. Once that budget is spent, or the
//! failure is permanent, it lands here instead of looping forever. Entries
//! pushed out of a full replay buffer are recorded here too.
//!
//! # Design
//!
//! The dead-letter queue is an in-memory structure with bounded capacity.
//! The host application decides whether to surface, persist or discard its
//! contents.
//!
//! # Example
//!
//! ```
//! use tether_core_resilience::dead_letter::{DeadLetterQueue, DeadLetterEntry, FailureReason};
//!
//! let mut dlq = DeadLetterQueue::new(100);
//!
//! dlq.push(DeadLetterEntry {
//!     replay_id: 7,
//!     label: "upload-receipt".to_string(),
//!     failure_reason: FailureReason::ReplaysExhausted { replays: 3 },
//!     last_error: "Server error 503: unavailable".to_string(),
//!     enqueued_at: std::time::SystemTime::now(),
//!     dead_lettered_at: std::time::SystemTime::now(),
//! });
//!
//! assert_eq!(dlq.len(), 1);
//! let entries = dlq.drain();
//! assert_eq!(entries.len(), 1);
//! ```

use std::collections::VecDeque;
use std::time::SystemTime;

/// Reason an operation was sent to the dead-letter queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Re-queue budget spent
    ReplaysExhausted { replays: u32 },

    /// Permanent error (non-transient, should not retry)
    PermanentError,

    /// Pushed out of a full replay buffer before it could run
    Evicted,

    /// Stopped by a global cancel while replaying
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::ReplaysExhausted { replays } => {
                write!(f, "replays exhausted after {} attempts", replays)
            }
            FailureReason::PermanentError => write!(f, "permanent error"),
            FailureReason::Evicted => write!(f, "evicted from full replay queue"),
            FailureReason::Cancelled => write!(f, "cancelled during replay"),
        }
    }
}

/// A single dead-letter entry
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    /// Id the operation had in the replay queue
    pub replay_id: u64,

    /// Caller-supplied label of the operation
    pub label: String,

    /// Why this operation was dead-lettered
    pub failure_reason: FailureReason,

    /// Last error message
    pub last_error: String,

    /// When the operation was first queued
    pub enqueued_at: SystemTime,

    /// When it was given up on
    pub dead_lettered_at: SystemTime,
}

/// In-memory dead-letter queue with bounded capacity.
///
/// Entries that exceed the capacity are dropped (oldest first) to prevent
/// unbounded memory growth.
#[derive(Debug)]
pub struct DeadLetterQueue {
    entries: VecDeque<DeadLetterEntry>,
    max_capacity: usize,
    total_received: u64,
    total_dropped: u64,
}

impl DeadLetterQueue {
    /// Create a new dead-letter queue with the given maximum capacity
    pub fn new(max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(max_capacity.min(1024)),
            max_capacity,
            total_received: 0,
            total_dropped: 0,
        }
    }

    /// Push an entry into the dead-letter queue.
    ///
    /// If the queue is at capacity, the oldest entry is dropped.
    pub fn push(&mut self, entry: DeadLetterEntry) {
        self.total_received += 1;

        if self.entries.len() >= self.max_capacity {
            self.entries.pop_front();
            self.total_dropped += 1;
        }

        tracing::warn!(
            replay_id = entry.replay_id,
            label = %entry.label,
            reason = %entry.failure_reason,
            "Operation moved to dead-letter queue"
        );
        self.entries.push_back(entry);
    }

    /// Drain all entries from the queue
    pub fn drain(&mut self) -> Vec<DeadLetterEntry> {
        self.entries.drain(..).collect()
    }

    /// Peek at all entries without removing them
    pub fn entries(&self) -> &VecDeque<DeadLetterEntry> {
        &self.entries
    }

    /// Get entries carrying a specific label
    pub fn entries_for_label(&self, label: &str) -> Vec<&DeadLetterEntry> {
        self.entries.iter().filter(|e| e.label == label).collect()
    }

    /// Number of entries currently in the queue
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> DeadLetterStats {
        DeadLetterStats {
            current_count: self.entries.len(),
            max_capacity: self.max_capacity,
            total_received: self.total_received,
            total_dropped: self.total_dropped,
        }
    }
}

/// Statistics for the dead-letter queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterStats {
    /// Current number of entries
    pub current_count: usize,
    /// Maximum capacity
    pub max_capacity: usize,
    /// Total entries ever received
    pub total_received: u64,
    /// Total entries dropped due to capacity overflow
    pub total_dropped: u64,
}
