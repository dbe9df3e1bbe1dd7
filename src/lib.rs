/*!
 * Tether - resilient execution for network-bound operations
 *
 * Wraps caller operations with:
 * - Connectivity monitoring with edge-triggered listeners
 * - Retry with capped exponential backoff and jitter
 * - Per-attempt timeouts and cooperative cancellation
 * - Fallback substitution
 * - Offline queueing and replay of critical operations
 */

pub mod alert;
pub mod cancellation;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod executor;
pub mod logging;
pub mod operation;
pub mod replay;
pub mod source;
pub mod subscription;

// Re-export commonly used types
pub use alert::{Alert, AlertSurface, RecordingAlertSurface, TracingAlertSurface};
pub use config::{ConnectivityConfig, LogLevel, OperationDefaults, ReplayConfig, TetherConfig};
pub use connectivity::ConnectivityMonitor;
pub use error::{Result, TetherError};
pub use executor::{ConnectivityUpdate, ResilientExecutor};
pub use operation::{ExecutionResult, OperationSpec};
pub use replay::{ReplayDispatch, ReplayDisposition, ReplayQueue, ReplayReport, ReplayStats};
pub use source::{ConnectivitySource, PumpSummary};
pub use subscription::{Subscription, SubscriptionRegistry};
pub use tether_core_resilience::{
    AlertCategory, BackoffPolicy, ConnectivityState, DeadLetterEntry, ErrorClass, ErrorKind,
    FailureReason, OperationError, RawConnectivityEvent, Reachability, ReplayId,
    ResilienceError, StateTransition,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
