//! Subscription Registry: fan-out of connectivity changes
//!
//! Listeners are invoked in registration order. A listener that panics is
//! logged and skipped; it does not stop the remaining listeners and stays
//! registered.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, warn};

use tether_core_resilience::ConnectivityState;

/// Callback receiving connectivity snapshots
pub type Listener = Arc<dyn Fn(&ConnectivityState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Ordered set of connectivity listeners
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<Listeners>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` and call it once with `current` before returning.
    pub fn subscribe<F>(&self, listener: F, current: &ConnectivityState) -> Subscription
    where
        F: Fn(&ConnectivityState) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push((id, Arc::clone(&listener)));
            id
        };
        debug!(subscriber = id, "Connectivity listener registered");

        invoke(id, &listener, current);

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Call every listener with `state`. Returns how many ran to completion.
    pub fn notify(&self, state: &ConnectivityState) -> usize {
        // Snapshot so listeners may (un)subscribe re-entrantly
        let listeners: Vec<(u64, Listener)> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.entries.clone()
        };

        listeners
            .iter()
            .filter(|(id, listener)| invoke(*id, listener, state))
            .count()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn invoke(id: u64, listener: &Listener, state: &ConnectivityState) -> bool {
    match catch_unwind(AssertUnwindSafe(|| listener(state))) {
        Ok(()) => true,
        Err(_) => {
            warn!(subscriber = id, "Connectivity listener panicked");
            false
        }
    }
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to stop
/// receiving updates. Dropping the handle leaves the listener registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut inner = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.entries.len();
        inner.entries.retain(|(id, _)| *id != self.id);
        let removed = inner.entries.len() != before;
        if removed {
            debug!(subscriber = self.id, "Connectivity listener removed");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tether_core_resilience::RawConnectivityEvent;

    fn offline() -> ConnectivityState {
        RawConnectivityEvent::offline().into()
    }

    #[test]
    fn test_subscribe_delivers_current_state_immediately() {
        let registry = SubscriptionRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        registry.subscribe(
            move |state| sink.lock().unwrap().push(state.connected),
            &offline(),
        );

        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_notify_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let current = ConnectivityState::assumed_online();

        for n in 0..3 {
            let order = order.clone();
            registry.subscribe(move |_| order.lock().unwrap().push(n), &current);
        }
        order.lock().unwrap().clear();

        assert_eq!(registry.notify(&offline()), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let registry = SubscriptionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let current = ConnectivityState::assumed_online();

        registry.subscribe(
            |state: &ConnectivityState| {
                if !state.connected {
                    panic!("listener failure");
                }
            },
            &current,
        );
        let counter = calls.clone();
        registry.subscribe(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &current,
        );

        assert_eq!(registry.notify(&offline()), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = SubscriptionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let sub = registry.subscribe(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &offline(),
        );
        assert!(sub.unsubscribe());
        assert!(registry.is_empty());

        registry.notify(&offline());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = SubscriptionRegistry::new();
        let sub = registry.subscribe(|_| {}, &offline());
        drop(registry);
        assert!(!sub.unsubscribe());
    }
}
