//! Resilient Executor: one call of a caller's operation, start to finish
//!
//! ```text
//!  execute(spec)
//!      │
//!      ├── offline ──► critical? enqueue ──► fallback? ──► result
//!      │
//!      └── online ───► attempt ─► timeout race ─► classify
//!                        ▲                          │
//!                        └──── backoff (transient) ─┘
//!                                                   │
//!                         exhausted / permanent ────┴──► fallback? ──► result
//! ```
//!
//! `execute` never returns an error: every terminal state is folded into an
//! [`ExecutionResult`]. Only a failed final result can raise an alert.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertSurface, TracingAlertSurface};
use crate::cancellation::CancellationRegistry;
use crate::config::TetherConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::operation::{ExecutionResult, OperationSpec};
use crate::replay::{ReplayDispatch, ReplayQueue};
use crate::subscription::Subscription;
use tether_core_resilience::{
    classify, ConnectivityState, ErrorClass, OperationError, RawConnectivityEvent,
    ResilienceError, StateTransition,
};

/// Who submitted a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Caller,
    Replay,
}

/// What a raw connectivity event changed
#[derive(Debug, Default)]
pub struct ConnectivityUpdate {
    /// Set when `connected` or reachability flipped
    pub transition: Option<StateTransition>,
    /// Replays started because the link came back
    pub replay: Option<ReplayDispatch>,
}

struct ExecutorInner {
    config: TetherConfig,
    monitor: ConnectivityMonitor,
    replay: ReplayQueue,
    cancellations: CancellationRegistry,
    alerts: Arc<dyn AlertSurface>,
    /// Runtime the executor was built on, if any
    runtime: Option<Handle>,
}

/// Wraps network-bound operations with retry, timeout, fallback and
/// offline replay. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ResilientExecutor {
    inner: Arc<ExecutorInner>,
}

impl std::fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("monitor", &self.inner.monitor)
            .field("replay", &self.inner.replay)
            .field("cancellations", &self.inner.cancellations)
            .finish()
    }
}

impl ResilientExecutor {
    /// Executor that reports alerts through the log
    pub fn new(config: TetherConfig) -> Self {
        Self::with_alerts(config, Arc::new(TracingAlertSurface))
    }

    pub fn new_default() -> Self {
        Self::new(TetherConfig::default())
    }

    /// Executor that shows alerts on the given surface
    pub fn with_alerts(config: TetherConfig, alerts: Arc<dyn AlertSurface>) -> Self {
        let monitor = ConnectivityMonitor::from_config(&config.connectivity);
        let replay = ReplayQueue::new(&config.replay);

        Self {
            inner: Arc::new(ExecutorInner {
                config,
                monitor,
                replay,
                cancellations: CancellationRegistry::new(),
                alerts,
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    pub fn config(&self) -> &TetherConfig {
        &self.inner.config
    }

    /// Spec for `run` using this executor's configured defaults
    pub fn operation<T, F, Fut>(&self, run: F) -> OperationSpec<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        OperationSpec::with_defaults(&self.inner.config.operation, run)
    }

    /// Run `spec` to completion and report how it went
    pub async fn execute<T: Send + 'static>(&self, spec: OperationSpec<T>) -> ExecutionResult<T> {
        self.run(spec, Origin::Caller).await
    }

    /// Run a queued spec; it is never queued again from here
    pub(crate) async fn replay<T: Send + 'static>(
        &self,
        spec: OperationSpec<T>,
    ) -> ExecutionResult<T> {
        self.run(spec, Origin::Replay).await
    }

    async fn run<T: Send + 'static>(
        &self,
        spec: OperationSpec<T>,
        origin: Origin,
    ) -> ExecutionResult<T> {
        let result = if self.inner.monitor.is_available() {
            if origin == Origin::Caller && self.inner.replay.take_deferred() {
                let dispatch = self.drain_replay_queue();
                info!(replays = dispatch.len(), "Started deferred replay");
            }
            self.run_online(&spec).await
        } else {
            self.run_offline(&spec, origin).await
        };

        if !result.success && spec.alert_on_failure {
            if let Some(error) = &result.error {
                let alert = Alert::for_failure(&spec.label, error);
                self.inner.alerts.show_alert(&alert.title, &alert.message);
            }
        }

        result
    }

    async fn run_offline<T: Send + 'static>(
        &self,
        spec: &OperationSpec<T>,
        origin: Origin,
    ) -> ExecutionResult<T> {
        if spec.critical && origin == Origin::Caller {
            self.inner.replay.enqueue(spec.clone());
        }

        match &spec.fallback {
            Some(fallback) => match fallback().await {
                Ok(data) => {
                    info!(op = %spec.label, "Offline; served fallback");
                    ExecutionResult::recovered(data, None, 0)
                }
                Err(source) => {
                    warn!(op = %spec.label, error = %source, "Offline fallback failed");
                    ExecutionResult::failed(ResilienceError::FallbackFailure { source }, 0)
                }
            },
            None => {
                debug!(op = %spec.label, "Offline with no fallback");
                ExecutionResult::failed(ResilienceError::NetworkUnavailable, 0)
            }
        }
    }

    async fn run_online<T: Send + 'static>(&self, spec: &OperationSpec<T>) -> ExecutionResult<T> {
        let scope = self.inner.cancellations.scope();
        let backoff = spec.backoff();
        let mut attempt: u32 = 0;

        let last_error = loop {
            let error = match self.attempt(spec, &scope).await {
                Ok(data) => {
                    if attempt > 0 {
                        info!(
                            op = %spec.label,
                            retries = attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return ExecutionResult::succeeded(data, attempt);
                }
                Err(error) => error,
            };

            if matches!(error, ResilienceError::Cancelled) {
                debug!(op = %spec.label, attempt, "Attempt cancelled");
                break error;
            }
            if classify(&error) == ErrorClass::Permanent {
                debug!(
                    op = %spec.label,
                    attempt,
                    error = %error,
                    "Permanent failure; not retrying"
                );
                break error;
            }
            if attempt >= spec.max_retries {
                warn!(
                    op = %spec.label,
                    attempts = attempt + 1,
                    error = %error,
                    "Retries exhausted"
                );
                break error;
            }

            let delay = backoff.next_delay(attempt);
            debug!(
                op = %spec.label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient failure; backing off"
            );

            tokio::select! {
                biased;
                _ = scope.cancelled() => break ResilienceError::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        };

        match &spec.fallback {
            Some(fallback) => match fallback().await {
                Ok(data) => {
                    info!(op = %spec.label, error = %last_error, "Served fallback after failure");
                    ExecutionResult::recovered(data, Some(last_error), attempt)
                }
                Err(e) => {
                    warn!(op = %spec.label, error = %e, "Fallback failed");
                    ExecutionResult::failed(last_error, attempt)
                }
            },
            None => ExecutionResult::failed(last_error, attempt),
        }
    }

    /// One attempt raced against its deadline and cancellation
    async fn attempt<T: Send + 'static>(
        &self,
        spec: &OperationSpec<T>,
        scope: &CancellationToken,
    ) -> Result<T, ResilienceError> {
        let token = self.inner.cancellations.attempt(scope);
        let deadline = spec.timeout_per_attempt;

        tokio::select! {
            biased;
            _ = token.token().cancelled() => Err(ResilienceError::Cancelled),
            outcome = tokio::time::timeout(deadline, (spec.run)()) => match outcome {
                Ok(result) => result.map_err(ResilienceError::from),
                Err(_) => {
                    token.cancel();
                    Err(ResilienceError::Timeout {
                        timeout_ms: millis(deadline),
                    })
                }
            },
        }
    }

    /// Feed one platform connectivity event.
    ///
    /// On offline → online the replay queue is drained before this returns.
    pub fn handle_raw_event(&self, event: RawConnectivityEvent) -> ConnectivityUpdate {
        let transition = self.inner.monitor.on_raw_event(event);
        let replay = transition
            .as_ref()
            .filter(|edge| edge.came_online())
            .map(|_| self.drain_replay_queue());

        ConnectivityUpdate { transition, replay }
    }

    /// Replay every queued operation now, regardless of connectivity
    pub fn drain_replay_queue(&self) -> ReplayDispatch {
        self.inner.replay.drain(self)
    }

    /// Runtime to spawn replays on: the caller's, else the one the executor
    /// was built on
    pub(crate) fn runtime(&self) -> Option<Handle> {
        Handle::try_current()
            .ok()
            .or_else(|| self.inner.runtime.clone())
    }

    /// Signal every in-flight call; each settles as a failure or fallback
    pub fn cancel_all(&self) -> usize {
        self.inner.cancellations.cancel_all()
    }

    /// Attempts currently running
    pub fn in_flight(&self) -> usize {
        self.inner.cancellations.in_flight()
    }

    pub fn subscribe_connectivity<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectivityState) + Send + Sync + 'static,
    {
        self.inner.monitor.subscribe(listener)
    }

    pub fn connectivity_state(&self) -> ConnectivityState {
        self.inner.monitor.state()
    }

    pub fn is_available(&self) -> bool {
        self.inner.monitor.is_available()
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.inner.monitor
    }

    pub fn replay_queue(&self) -> &ReplayQueue {
        &self.inner.replay
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingAlertSurface;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn offline_executor() -> ResilientExecutor {
        let executor = ResilientExecutor::new_default();
        executor.handle_raw_event(RawConnectivityEvent::offline());
        executor
    }

    fn counting(
        calls: &Arc<AtomicU32>,
    ) -> impl Fn() -> std::future::Ready<Result<u32, OperationError>> + Send + Sync + 'static {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err(OperationError::status(503, "unavailable")))
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = ResilientExecutor::new_default();
        let result = executor
            .execute(OperationSpec::new(|| async { Ok::<_, OperationError>("ok") }))
            .await;

        assert!(result.success);
        assert_eq!(result.data, Some("ok"));
        assert_eq!(result.retries_used, 0);
        assert!(!result.from_fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_last_error() {
        let executor = ResilientExecutor::new_default();
        let calls = Arc::new(AtomicU32::new(0));
        let spec = OperationSpec::new(counting(&calls)).with_max_retries(2);

        let result = executor.execute(spec).await;
        assert!(!result.success);
        assert_eq!(result.retries_used, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result.error,
            Some(ResilienceError::TransientServerError { status: 503, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_transient() {
        let executor = ResilientExecutor::new_default();
        let spec = OperationSpec::new(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, OperationError>(())
        })
        .with_timeout(Duration::from_millis(200))
        .with_max_retries(1);

        let result = executor.execute(spec).await;
        assert_eq!(result.error, Some(ResilienceError::Timeout { timeout_ms: 200 }));
        assert_eq!(result.retries_used, 1);
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_keeps_last_error() {
        let executor = ResilientExecutor::new_default();
        let calls = Arc::new(AtomicU32::new(0));
        let spec = OperationSpec::new(counting(&calls))
            .with_max_retries(1)
            .with_fallback(|| async { Ok(7) });

        let result = executor.execute(spec).await;
        assert!(result.success);
        assert!(result.from_fallback);
        assert_eq!(result.data, Some(7));
        assert_eq!(result.retries_used, 1);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_failed_fallback_reports_operation_error() {
        let executor = ResilientExecutor::new_default();
        let spec = OperationSpec::new(|| async {
            Err::<u32, _>(OperationError::validation("bad input"))
        })
        .with_fallback(|| async { Err(OperationError::other("cache empty")) });

        let result = executor.execute(spec).await;
        assert!(!result.success);
        assert!(matches!(
            result.error,
            Some(ResilienceError::PermanentClientError { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_offline_without_fallback_is_network_unavailable() {
        let executor = offline_executor();
        let calls = Arc::new(AtomicU32::new(0));
        let result = executor.execute(OperationSpec::new(counting(&calls))).await;

        assert_eq!(result.error, Some(ResilienceError::NetworkUnavailable));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(executor.replay_queue().is_empty());
    }

    #[tokio::test]
    async fn test_offline_fallback_failure() {
        let executor = offline_executor();
        let spec = OperationSpec::new(|| async { Ok::<u32, OperationError>(1) })
            .with_fallback(|| async { Err(OperationError::other("no cache")) });

        let result = executor.execute(spec).await;
        assert!(matches!(
            result.error,
            Some(ResilienceError::FallbackFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_offline_replay_is_not_requeued() {
        let executor = offline_executor();
        let spec = OperationSpec::new(|| async { Ok::<u32, OperationError>(1) }).critical(true);

        let result = executor.replay(spec).await;
        assert_eq!(result.error, Some(ResilienceError::NetworkUnavailable));
        assert!(executor.replay_queue().is_empty());
    }

    #[tokio::test]
    async fn test_alert_only_for_failed_results() {
        let surface = Arc::new(RecordingAlertSurface::new());
        let executor = ResilientExecutor::with_alerts(TetherConfig::default(), surface.clone());

        let ok = OperationSpec::new(|| async { Ok::<_, OperationError>(1) }).alert_on_failure(true);
        executor.execute(ok).await;
        assert!(surface.alerts().is_empty());

        let silent = OperationSpec::new(|| async {
            Err::<u32, _>(OperationError::status(404, "missing"))
        });
        executor.execute(silent).await;
        assert!(surface.alerts().is_empty());

        let loud = OperationSpec::new(|| async {
            Err::<u32, _>(OperationError::status(404, "missing"))
        })
        .with_label("profile")
        .alert_on_failure(true);
        executor.execute(loud).await;
        assert_eq!(surface.titles(), vec!["Request Failed".to_string()]);
    }

    #[tokio::test]
    async fn test_operation_uses_configured_defaults() {
        let mut config = TetherConfig::default();
        config.operation.max_retries = 9;
        let executor = ResilientExecutor::new(config);

        let spec = executor.operation(|| async { Ok::<_, OperationError>(()) });
        assert_eq!(spec.max_retries, 9);
    }

    #[test]
    fn test_went_offline_does_not_drain() {
        let executor = ResilientExecutor::new_default();
        let update = executor.handle_raw_event(RawConnectivityEvent::offline());
        assert!(update.transition.is_some_and(|t| t.went_offline()));
        assert!(update.replay.is_none());
    }
}
