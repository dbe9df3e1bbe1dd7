//! Connectivity snapshots and edge detection
//!
//! A [`ConnectivityState`] is rebuilt from every raw platform event. Only a
//! change in `connected` or `internet_reachable` counts as a transition;
//! transport or detail changes alone are not edges.

use serde::{Deserialize, Serialize};

/// Whether the wider internet is reachable through the current link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    /// The platform could not tell without issuing a real request
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

impl From<Option<bool>> for Reachability {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Reachability::Unknown,
            Some(true) => Reachability::Reachable,
            Some(false) => Reachability::Unreachable,
        }
    }
}

/// Raw event as reported by the platform's connectivity sensor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawConnectivityEvent {
    /// Link layer is up
    pub connected: bool,
    /// `None` when the platform cannot determine reachability
    pub internet_reachable: Option<bool>,
    /// Transport name ("wifi", "cellular", ...)
    #[serde(default)]
    pub transport: String,
    /// Platform-specific payload, passed through untouched
    #[serde(default)]
    pub details: serde_json::Value,
}

impl RawConnectivityEvent {
    /// Event for a link that is up with the given reachability
    pub fn online(transport: impl Into<String>, internet_reachable: Option<bool>) -> Self {
        Self {
            connected: true,
            internet_reachable,
            transport: transport.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Event for a link that is down
    pub fn offline() -> Self {
        Self {
            connected: false,
            internet_reachable: Some(false),
            transport: "none".to_string(),
            details: serde_json::Value::Null,
        }
    }
}

/// Current connectivity snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub connected: bool,
    pub internet_reachable: Reachability,
    pub transport: String,
    pub details: serde_json::Value,
}

impl ConnectivityState {
    /// Optimistic starting state: connected, reachability unknown
    pub fn assumed_online() -> Self {
        Self {
            connected: true,
            internet_reachable: Reachability::Unknown,
            transport: "unknown".to_string(),
            details: serde_json::Value::Null,
        }
    }

    /// Starting state for hosts that must not assume a link
    pub fn assumed_offline() -> Self {
        Self {
            connected: false,
            internet_reachable: Reachability::Unknown,
            transport: "none".to_string(),
            details: serde_json::Value::Null,
        }
    }

    /// `connected` and reachability not known to be false.
    ///
    /// Unknown reachability counts as available.
    pub fn is_available(&self) -> bool {
        self.connected && self.internet_reachable != Reachability::Unreachable
    }

    /// True when `other` differs in a field that listeners care about
    pub fn differs_from(&self, other: &ConnectivityState) -> bool {
        self.connected != other.connected || self.internet_reachable != other.internet_reachable
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::assumed_online()
    }
}

impl From<RawConnectivityEvent> for ConnectivityState {
    fn from(event: RawConnectivityEvent) -> Self {
        Self {
            connected: event.connected,
            internet_reachable: event.internet_reachable.into(),
            transport: event.transport,
            details: event.details,
        }
    }
}

/// An edge between two snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub previous: ConnectivityState,
    pub current: ConnectivityState,
}

impl StateTransition {
    /// Compute the transition from `previous` to `current`, if any
    pub fn between(previous: &ConnectivityState, current: &ConnectivityState) -> Option<Self> {
        if previous.differs_from(current) {
            Some(Self {
                previous: previous.clone(),
                current: current.clone(),
            })
        } else {
            None
        }
    }

    /// Offline → online
    pub fn came_online(&self) -> bool {
        !self.previous.is_available() && self.current.is_available()
    }

    /// Online → offline
    pub fn went_offline(&self) -> bool {
        self.previous.is_available() && !self.current.is_available()
    }
}
