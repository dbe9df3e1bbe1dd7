//! Cancellation bookkeeping for in-flight attempts
//!
//! Every attempt owns one token, registered here for as long as the attempt
//! runs. Each `execute` call also holds a scope token derived from a shared
//! root, which lets [`CancellationRegistry::cancel_all`] reach calls that
//! are between attempts (sleeping in backoff) as well.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::info;

struct Tokens {
    root: CancellationToken,
    next_id: u64,
    outstanding: HashMap<u64, CancellationToken>,
}

/// Registry of outstanding attempt tokens
#[derive(Clone)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<Tokens>>,
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tokens {
                root: CancellationToken::new(),
                next_id: 0,
                outstanding: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tokens> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Token covering one whole `execute` call
    pub fn scope(&self) -> CancellationToken {
        self.lock().root.child_token()
    }

    /// Register a token for one attempt under `scope`.
    ///
    /// The token is unregistered when the returned guard drops.
    pub fn attempt(&self, scope: &CancellationToken) -> AttemptToken {
        let token = scope.child_token();
        let mut tokens = self.lock();
        let id = tokens.next_id;
        tokens.next_id += 1;
        tokens.outstanding.insert(id, token.clone());

        AttemptToken {
            id,
            token,
            registry: self.clone(),
        }
    }

    /// Signal every outstanding attempt and every running `execute` scope.
    ///
    /// Calls that start afterwards are unaffected. Returns the number of
    /// attempt tokens signalled.
    pub fn cancel_all(&self) -> usize {
        let mut tokens = self.lock();
        let signalled = tokens.outstanding.len();

        for token in tokens.outstanding.values() {
            token.cancel();
        }
        tokens.root.cancel();
        tokens.root = CancellationToken::new();

        info!(attempts = signalled, "Cancelled all in-flight operations");
        signalled
    }

    /// Number of attempts currently registered
    pub fn in_flight(&self) -> usize {
        self.lock().outstanding.len()
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistry")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Token of a single attempt; unregisters itself on drop
pub struct AttemptToken {
    id: u64,
    token: CancellationToken,
    registry: CancellationRegistry,
}

impl AttemptToken {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for AttemptToken {
    fn drop(&mut self) {
        self.registry.lock().outstanding.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_registration_and_release() {
        let registry = CancellationRegistry::new();
        let scope = registry.scope();

        let first = registry.attempt(&scope);
        let second = registry.attempt(&scope);
        assert_eq!(registry.in_flight(), 2);

        drop(first);
        assert_eq!(registry.in_flight(), 1);
        drop(second);
        assert_eq!(registry.in_flight(), 0);
    }

    #[test]
    fn test_cancel_all_signals_attempts_and_scopes() {
        let registry = CancellationRegistry::new();
        let scope = registry.scope();
        let idle_scope = registry.scope();
        let attempt = registry.attempt(&scope);

        assert_eq!(registry.cancel_all(), 1);
        assert!(attempt.is_cancelled());
        assert!(scope.is_cancelled());
        assert!(idle_scope.is_cancelled());
    }

    #[test]
    fn test_new_scopes_survive_earlier_cancel() {
        let registry = CancellationRegistry::new();
        registry.cancel_all();

        let scope = registry.scope();
        let attempt = registry.attempt(&scope);
        assert!(!scope.is_cancelled());
        assert!(!attempt.is_cancelled());
    }

    #[test]
    fn test_cancelling_one_attempt_leaves_scope_alive() {
        let registry = CancellationRegistry::new();
        let scope = registry.scope();
        let attempt = registry.attempt(&scope);

        attempt.cancel();
        assert!(attempt.is_cancelled());
        assert!(!scope.is_cancelled());
    }
}
