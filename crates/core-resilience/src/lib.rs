//! Tether Core Resilience: Pure-logic primitives for resilient execution
//!
//! # Overview
//!
//! This crate holds the decision logic behind tether's executor, with no
//! timers, tasks or transports:
//!
//! - **Error taxonomy**: typed transport errors and their classification
//! - **Retry policy**: transient/permanent decisions and capped, jittered backoff
//! - **Connectivity**: snapshots built from raw platform events, edge detection
//! - **Replay buffer**: bounded FIFO for work submitted while offline
//! - **Dead-letter queue**: bounded quarantine for replays that keep failing
//!
//! # Architecture
//!
//! ```text
//!  raw platform event
//!          │
//!          ▼
//! ┌─────────────────────────────────────────┐
//! │   ConnectivityState / StateTransition   │  ← edge-triggered
//! └─────────────┬───────────────────────────┘
//!               │ offline → online
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Replay Buffer                     │  ← work held while offline
//! └─────────────┬───────────────────────────┘
//!               │ replay failed too often?
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Dead-Letter Queue                 │
//! └─────────────────────────────────────────┘
//!
//!  Per attempt:
//!   OperationError → ResilienceError → classify → next_delay
//! ```
//!
//! # Usage Example
//!
//! ```
//! use tether_core_resilience::{classify, ErrorClass, OperationError, ResilienceError};
//!
//! let err: ResilienceError = OperationError::status(503, "unavailable").into();
//! assert_eq!(classify(&err), ErrorClass::Transient);
//!
//! let err: ResilienceError = OperationError::status(404, "no such user").into();
//! assert_eq!(classify(&err), ErrorClass::Permanent);
//! ```

pub mod connectivity;
pub mod dead_letter;
pub mod error;
pub mod replay_buffer;
pub mod retry;

// Re-export main types for convenience
pub use connectivity::{ConnectivityState, RawConnectivityEvent, Reachability, StateTransition};
pub use dead_letter::{DeadLetterEntry, DeadLetterQueue, DeadLetterStats, FailureReason};
pub use error::{AlertCategory, ErrorClass, ErrorKind, OperationError, ResilienceError};
pub use replay_buffer::{BufferedEntry, ReplayBuffer, ReplayBufferStats, ReplayId};
pub use retry::{base_delay, classify, next_delay, next_delay_with, BackoffPolicy};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use tether_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::connectivity::{ConnectivityState, RawConnectivityEvent, Reachability};
    pub use super::dead_letter::{DeadLetterEntry, DeadLetterQueue, FailureReason};
    pub use super::error::{ErrorClass, ErrorKind, OperationError, ResilienceError};
    pub use super::replay_buffer::{ReplayBuffer, ReplayId};
    pub use super::retry::{classify, next_delay, BackoffPolicy};
}
