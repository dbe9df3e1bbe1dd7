//! Replay Buffer: bounded FIFO of work held back while offline
//!
//! The buffer issues an opaque [`ReplayId`] for every new entry and keeps
//! entries in submission order. When it is full the oldest entry is evicted
//! and handed back to the caller, so nothing disappears silently.
//!
//! It knows nothing about what a job is or how it is run; the async replay
//! queue wraps it with locking and dispatch.
//!
//! # Example
//!
//! ```
//! use tether_core_resilience::replay_buffer::ReplayBuffer;
//!
//! let mut buffer = ReplayBuffer::new(2);
//! let (first, _) = buffer.push("sync-contacts");
//! buffer.push("upload-photo");
//! let (_, evicted) = buffer.push("send-message");
//!
//! assert_eq!(evicted.map(|e| e.id), Some(first));
//! let entries = buffer.take_all();
//! assert_eq!(entries.len(), 2);
//! assert!(buffer.is_empty());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::SystemTime;

/// Opaque identifier of a buffered entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplayId(u64);

impl ReplayId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replay-{}", self.0)
    }
}

/// A job waiting for connectivity
#[derive(Debug, Clone)]
pub struct BufferedEntry<J> {
    pub id: ReplayId,
    /// When the entry was first submitted
    pub enqueued_at: SystemTime,
    /// Replays already dispatched for this entry
    pub replays: u32,
    pub job: J,
}

/// Bounded FIFO with id issuance and overflow accounting
#[derive(Debug)]
pub struct ReplayBuffer<J> {
    entries: VecDeque<BufferedEntry<J>>,
    capacity: usize,
    next_id: u64,
    total_enqueued: u64,
    total_requeued: u64,
    total_evicted: u64,
    total_taken: u64,
}

impl<J> ReplayBuffer<J> {
    /// Create a buffer holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_id: 1,
            total_enqueued: 0,
            total_requeued: 0,
            total_evicted: 0,
            total_taken: 0,
        }
    }

    /// Add a new job. Returns its id and the entry evicted to make room, if any.
    pub fn push(&mut self, job: J) -> (ReplayId, Option<BufferedEntry<J>>) {
        let id = ReplayId(self.next_id);
        self.next_id += 1;
        self.total_enqueued += 1;

        let evicted = self.insert(BufferedEntry {
            id,
            enqueued_at: SystemTime::now(),
            replays: 0,
            job,
        });
        (id, evicted)
    }

    /// Put a previously taken entry back, keeping its id and history.
    pub fn requeue(&mut self, entry: BufferedEntry<J>) -> Option<BufferedEntry<J>> {
        self.total_requeued += 1;
        self.insert(entry)
    }

    fn insert(&mut self, entry: BufferedEntry<J>) -> Option<BufferedEntry<J>> {
        let evicted = if self.entries.len() >= self.capacity {
            self.total_evicted += 1;
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Remove and return every entry, oldest first
    pub fn take_all(&mut self) -> Vec<BufferedEntry<J>> {
        self.total_taken += self.entries.len() as u64;
        self.entries.drain(..).collect()
    }

    /// Ids currently waiting, oldest first
    pub fn ids(&self) -> Vec<ReplayId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> ReplayBufferStats {
        ReplayBufferStats {
            current_count: self.entries.len(),
            capacity: self.capacity,
            total_enqueued: self.total_enqueued,
            total_requeued: self.total_requeued,
            total_evicted: self.total_evicted,
            total_taken: self.total_taken,
        }
    }
}

/// Counters for a [`ReplayBuffer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayBufferStats {
    pub current_count: usize,
    pub capacity: usize,
    /// New entries ever pushed
    pub total_enqueued: u64,
    /// Entries put back after a failed replay
    pub total_requeued: u64,
    /// Entries dropped because the buffer was full
    pub total_evicted: u64,
    /// Entries handed out by `take_all`
    pub total_taken: u64,
}
