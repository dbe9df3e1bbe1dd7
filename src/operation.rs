//! Operation specs and execution results
//!
//! An [`OperationSpec`] bundles a caller's network-bound closure with the
//! policy for running it. Specs are built once and never change while an
//! `execute` call is using them; cloning one only clones `Arc`s.

use futures::future::BoxFuture;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::OperationDefaults;
use tether_core_resilience::{BackoffPolicy, OperationError, ResilienceError};

/// Shared async closure producing one attempt (or one fallback) of an operation
pub type OperationFn<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<T, OperationError>> + Send + Sync>;

fn boxed<T, F, Fut>(f: F) -> OperationFn<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, Result<T, OperationError>> { Box::pin(f()) })
}

/// Caller-supplied description of one resilient operation
pub struct OperationSpec<T> {
    pub(crate) run: OperationFn<T>,
    pub(crate) fallback: Option<OperationFn<T>>,
    /// Name used in logs, alerts and dead-letter entries
    pub label: String,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    /// Cap on a single backoff delay
    pub max_delay: Duration,
    /// Randomize backoff delays
    pub jitter: bool,
    pub timeout_per_attempt: Duration,
    /// Queue for replay when submitted offline
    pub critical: bool,
    /// Surface a user-visible alert when the final result is a failure
    pub alert_on_failure: bool,
}

impl<T> Clone for OperationSpec<T> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
            fallback: self.fallback.clone(),
            label: self.label.clone(),
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            backoff_factor: self.backoff_factor,
            max_delay: self.max_delay,
            jitter: self.jitter,
            timeout_per_attempt: self.timeout_per_attempt,
            critical: self.critical,
            alert_on_failure: self.alert_on_failure,
        }
    }
}

impl<T> fmt::Debug for OperationSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSpec")
            .field("label", &self.label)
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("timeout_per_attempt", &self.timeout_per_attempt)
            .field("has_fallback", &self.fallback.is_some())
            .field("critical", &self.critical)
            .field("alert_on_failure", &self.alert_on_failure)
            .finish()
    }
}

impl<T: Send + 'static> OperationSpec<T> {
    /// Spec with the built-in defaults (3 retries, 1s initial delay, x2, 10s timeout)
    ///
    /// # Example
    /// ```
    /// use tether::{OperationError, OperationSpec};
    /// use std::time::Duration;
    ///
    /// let spec = OperationSpec::new(|| async { Ok::<_, OperationError>("pong") })
    ///     .with_label("ping")
    ///     .with_max_retries(2)
    ///     .with_timeout(Duration::from_millis(500))
    ///     .with_fallback(|| async { Ok("cached pong") })
    ///     .critical(true);
    ///
    /// assert_eq!(spec.max_retries, 2);
    /// assert!(spec.has_fallback());
    /// ```
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        Self::with_defaults(&OperationDefaults::default(), run)
    }

    /// Spec whose policy fields come from configured defaults
    pub fn with_defaults<F, Fut>(defaults: &OperationDefaults, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        Self {
            run: boxed(run),
            fallback: None,
            label: "operation".to_string(),
            max_retries: defaults.max_retries,
            initial_delay: defaults.initial_delay(),
            backoff_factor: defaults.backoff_factor,
            max_delay: defaults.max_delay(),
            jitter: defaults.jitter,
            timeout_per_attempt: defaults.timeout_per_attempt(),
            critical: false,
            alert_on_failure: false,
        }
    }

    /// Substitute value used when the real operation cannot succeed
    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        self.fallback = Some(boxed(fallback));
        self
    }
}

impl<T> OperationSpec<T> {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_delay(mut self, cap: Duration) -> Self {
        self.max_delay = cap;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_per_attempt = timeout;
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn alert_on_failure(mut self, alert: bool) -> Self {
        self.alert_on_failure = alert;
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Backoff parameters of this spec
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: self.initial_delay,
            backoff_factor: self.backoff_factor,
            max_delay: self.max_delay,
            jitter: self.jitter,
        }
    }

    pub(crate) fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }
}

/// Outcome of exactly one `execute` call
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult<T> {
    pub success: bool,
    pub data: Option<T>,
    /// Terminal error; kept even when a fallback succeeded
    pub error: Option<ResilienceError>,
    /// The data came from the fallback, not the operation
    pub from_fallback: bool,
    /// Index of the attempt that ended the loop (0 = no retries)
    pub retries_used: u32,
}

impl<T> ExecutionResult<T> {
    pub(crate) fn succeeded(data: T, retries_used: u32) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            from_fallback: false,
            retries_used,
        }
    }

    pub(crate) fn recovered(
        data: T,
        error: Option<ResilienceError>,
        retries_used: u32,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error,
            from_fallback: true,
            retries_used,
        }
    }

    pub(crate) fn failed(error: ResilienceError, retries_used: u32) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            from_fallback: false,
            retries_used,
        }
    }

    /// Convert into a plain `Result`, dropping the bookkeeping
    pub fn into_result(self) -> Result<T, ResilienceError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(err)) => Err(err),
            (None, None) => Err(ResilienceError::Other("execution produced no data".to_string())),
        }
    }

    /// Map the payload, keeping the bookkeeping
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExecutionResult<U> {
        ExecutionResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            from_fallback: self.from_fallback,
            retries_used: self.retries_used,
        }
    }
}

impl<T: Serialize> Serialize for ExecutionResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExecutionResult", 5)?;
        state.serialize_field("success", &self.success)?;
        state.serialize_field("data", &self.data)?;
        state.serialize_field("error", &self.error.as_ref().map(|e| e.to_string()))?;
        state.serialize_field("from_fallback", &self.from_fallback)?;
        state.serialize_field("retries_used", &self.retries_used)?;
        state.end()
    }
}
