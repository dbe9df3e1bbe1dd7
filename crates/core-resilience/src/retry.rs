//! Retry policy: error classification and backoff delays
//!
//! Everything here is a pure function of its inputs. The executor asks two
//! questions after a failed attempt: is the error worth retrying
//! ([`classify`]), and how long should it wait first ([`next_delay`]).
//!
//! # Backoff
//!
//! The unjittered base delay for attempt `n` (0-indexed) is
//! `min(initial_delay * backoff_factor^n, cap)`. With jitter enabled the
//! final delay is sampled uniformly from `[0.5 * base, 1.0 * base]`, which
//! spreads out clients that failed at the same moment.
//!
//! # Example
//!
//! ```
//! use tether_core_resilience::retry::{base_delay, BackoffPolicy};
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy {
//!     initial_delay: Duration::from_millis(1000),
//!     backoff_factor: 2.0,
//!     max_delay: Duration::from_secs(30),
//!     jitter: false,
//! };
//!
//! assert_eq!(policy.next_delay(0), Duration::from_millis(1000));
//! assert_eq!(policy.next_delay(1), Duration::from_millis(2000));
//! assert_eq!(
//!     base_delay(10, Duration::from_millis(1000), 2.0, Duration::from_secs(30)),
//!     Duration::from_secs(30)
//! );
//! ```

use crate::error::{ErrorClass, ResilienceError};
use rand::Rng;
use std::time::Duration;

/// Lower bound of the jitter window, as a fraction of the base delay
pub const JITTER_FLOOR: f64 = 0.5;

/// Classify an error as transient or permanent.
///
/// Connection failures, resets, timeouts and 5xx responses are transient.
/// Client errors, validation failures and anything uncategorized are
/// permanent and must short-circuit the retry loop.
pub fn classify(error: &ResilienceError) -> ErrorClass {
    error.class()
}

/// Unjittered delay before the retry that follows attempt `attempt`.
///
/// Factors below 1.0 (or non-finite) are treated as 1.0 so the sequence is
/// non-decreasing in `attempt`. The result never exceeds `cap`.
pub fn base_delay(
    attempt: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    cap: Duration,
) -> Duration {
    let factor = if backoff_factor.is_finite() && backoff_factor >= 1.0 {
        backoff_factor
    } else {
        1.0
    };

    let exponent = attempt.min(i32::MAX as u32) as i32;
    let secs = initial_delay.as_secs_f64() * factor.powi(exponent);
    let cap_secs = cap.as_secs_f64();

    if !secs.is_finite() || secs >= cap_secs {
        cap
    } else {
        Duration::from_secs_f64(secs)
    }
}

/// Delay before the retry that follows attempt `attempt`, using the
/// thread-local RNG for jitter.
pub fn next_delay(
    attempt: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    cap: Duration,
    jitter: bool,
) -> Duration {
    next_delay_with(
        &mut rand::rng(),
        attempt,
        initial_delay,
        backoff_factor,
        cap,
        jitter,
    )
}

/// Same as [`next_delay`] with an explicit RNG.
pub fn next_delay_with<R: Rng>(
    rng: &mut R,
    attempt: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    cap: Duration,
    jitter: bool,
) -> Duration {
    let base = base_delay(attempt, initial_delay, backoff_factor, cap);
    if !jitter || base.is_zero() {
        return base;
    }

    let scale = rng.random_range(JITTER_FLOOR..=1.0);
    base.mul_f64(scale)
}

/// Backoff parameters bundled together
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Multiplier applied for each further attempt
    pub backoff_factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Randomize each delay within `[0.5, 1.0] * base`
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Unjittered delay after attempt `attempt`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        base_delay(attempt, self.initial_delay, self.backoff_factor, self.max_delay)
    }

    /// Delay after attempt `attempt`, jittered if enabled
    pub fn next_delay(&self, attempt: u32) -> Duration {
        next_delay(
            attempt,
            self.initial_delay,
            self.backoff_factor,
            self.max_delay,
            self.jitter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_classify_transient() {
        let transient = [
            ResilienceError::Timeout { timeout_ms: 500 },
            OperationError::connection_failed("refused").into(),
            OperationError::connection_reset("reset").into(),
            OperationError::status(503, "unavailable").into(),
        ];

        for err in &transient {
            assert_eq!(classify(err), ErrorClass::Transient, "{:?}", err);
        }
    }

    #[test]
    fn test_classify_permanent() {
        let permanent = [
            OperationError::status(404, "not found").into(),
            OperationError::status(422, "unprocessable").into(),
            OperationError::validation("bad email").into(),
            OperationError::other("insufficient balance").into(),
        ];

        for err in &permanent {
            assert_eq!(classify(err), ErrorClass::Permanent, "{:?}", err);
        }
    }

    #[test]
    fn test_exponential_base_sequence() {
        let delays: Vec<_> = (0..4)
            .map(|n| base_delay(n, SECOND, 2.0, Duration::from_secs(60)))
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn test_base_sequence_is_capped_and_non_decreasing() {
        let cap = Duration::from_secs(10);
        let mut previous = Duration::ZERO;

        for attempt in 0..200 {
            let delay = base_delay(attempt, SECOND, 3.0, cap);
            assert!(delay >= previous);
            assert!(delay <= cap);
            previous = delay;
        }

        // Overflowing exponents land on the cap instead of panicking
        assert_eq!(base_delay(u32::MAX, SECOND, 10.0, cap), cap);
    }

    #[test]
    fn test_shrinking_factor_is_clamped() {
        let cap = Duration::from_secs(60);
        assert_eq!(base_delay(3, SECOND, 0.5, cap), SECOND);
        assert_eq!(base_delay(3, SECOND, f64::NAN, cap), SECOND);
    }

    #[test]
    fn test_jitter_stays_in_window() {
        let mut rng = SmallRng::seed_from_u64(7);
        let cap = Duration::from_secs(30);

        for attempt in 0..10 {
            let base = base_delay(attempt, SECOND, 2.0, cap);
            for _ in 0..100 {
                let delay = next_delay_with(&mut rng, attempt, SECOND, 2.0, cap, true);
                assert!(delay >= base.mul_f64(JITTER_FLOOR), "{:?} < half of {:?}", delay, base);
                assert!(delay <= base, "{:?} > {:?}", delay, base);
            }
        }
    }

    #[test]
    fn test_no_jitter_returns_base() {
        let mut rng = SmallRng::seed_from_u64(1);
        let cap = Duration::from_secs(30);
        assert_eq!(
            next_delay_with(&mut rng, 2, SECOND, 2.0, cap, false),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_zero_initial_delay() {
        assert_eq!(
            next_delay(5, Duration::ZERO, 2.0, Duration::from_secs(1), true),
            Duration::ZERO
        );
    }

    #[test]
    fn test_policy_helpers() {
        let policy = BackoffPolicy {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(policy.next_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.base_delay(20), policy.max_delay);
    }
}
