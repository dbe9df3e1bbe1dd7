//! Connectivity Monitor: current reachability and edge-triggered updates
//!
//! The monitor owns the single [`ConnectivityState`] snapshot. Each raw
//! platform event replaces the snapshot; listeners hear about it only when
//! `connected` or `internet_reachable` actually changed. The transition is
//! handed back to the caller so the executor can drain its replay queue on
//! offline → online.

use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use crate::config::ConnectivityConfig;
use crate::subscription::{Subscription, SubscriptionRegistry};
use tether_core_resilience::{ConnectivityState, RawConnectivityEvent, StateTransition};

/// Tracks the current connectivity state and notifies listeners on change
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: RwLock<ConnectivityState>,
    subscribers: SubscriptionRegistry,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectivityState::assumed_online())
    }
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        Self {
            state: RwLock::new(initial),
            subscribers: SubscriptionRegistry::new(),
        }
    }

    pub fn from_config(config: &ConnectivityConfig) -> Self {
        if config.assume_online_at_start {
            Self::new(ConnectivityState::assumed_online())
        } else {
            Self::new(ConnectivityState::assumed_offline())
        }
    }

    /// Apply a raw event. Returns the transition if listeners were notified.
    pub(crate) fn on_raw_event(&self, event: RawConnectivityEvent) -> Option<StateTransition> {
        let next = ConnectivityState::from(event);

        let transition = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let transition = StateTransition::between(&state, &next);
            *state = next;
            transition
        };

        match &transition {
            Some(edge) => {
                info!(
                    connected = edge.current.connected,
                    reachable = ?edge.current.internet_reachable,
                    transport = %edge.current.transport,
                    available = edge.current.is_available(),
                    "Connectivity changed"
                );
                self.subscribers.notify(&edge.current);
            }
            None => debug!("Connectivity event without state change"),
        }

        transition
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ConnectivityState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Connected, and reachability not known to be false
    pub fn is_available(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_available()
    }

    /// Register a listener; it is called once right away with the current state.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectivityState) + Send + Sync + 'static,
    {
        let current = self.state();
        self.subscribers.subscribe(listener, &current)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
