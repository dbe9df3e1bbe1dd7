//! User-facing alerts for failed operations
//!
//! The host application supplies an [`AlertSurface`]; tether only decides
//! when to call it and with which title.

use std::sync::{Mutex, PoisonError};
use tracing::warn;

use tether_core_resilience::{AlertCategory, ResilienceError};

/// Collaborator that shows a notification to the user
pub trait AlertSurface: Send + Sync {
    fn show_alert(&self, title: &str, message: &str);
}

/// A categorized, human-readable notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub category: AlertCategory,
    pub title: String,
    pub message: String,
}

impl Alert {
    /// Build the alert for a failed operation
    pub fn for_failure(label: &str, error: &ResilienceError) -> Self {
        let category = error.alert_category();
        let (title, message) = match category {
            AlertCategory::Timeout => (
                "Request Timed Out",
                format!("{} took too long to respond. Please try again.", label),
            ),
            AlertCategory::ServerError => (
                "Server Error",
                format!("The server could not complete {}. Please try again later.", label),
            ),
            AlertCategory::Generic => (
                "Request Failed",
                format!("{} failed: {}", label, error),
            ),
        };

        Self {
            category,
            title: title.to_string(),
            message,
        }
    }
}

/// Default surface: writes alerts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSurface;

impl AlertSurface for TracingAlertSurface {
    fn show_alert(&self, title: &str, message: &str) {
        warn!(title, message, "User alert");
    }
}

/// Surface that keeps every alert in memory, for tests and headless hosts
#[derive(Debug, Default)]
pub struct RecordingAlertSurface {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingAlertSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts shown so far as `(title, message)` pairs
    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.alerts().into_iter().map(|(title, _)| title).collect()
    }
}

impl AlertSurface for RecordingAlertSurface {
    fn show_alert(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((title.to_string(), message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_titles_by_category() {
        let timeout = Alert::for_failure("sync", &ResilienceError::Timeout { timeout_ms: 500 });
        assert_eq!(timeout.category, AlertCategory::Timeout);
        assert_eq!(timeout.title, "Request Timed Out");

        let server = Alert::for_failure(
            "sync",
            &ResilienceError::TransientServerError {
                status: 503,
                message: "unavailable".to_string(),
            },
        );
        assert_eq!(server.title, "Server Error");

        let generic = Alert::for_failure("sync", &ResilienceError::NetworkUnavailable);
        assert_eq!(generic.title, "Request Failed");
        assert_eq!(generic.message, "sync failed: Network unavailable");
    }

    #[test]
    fn test_recording_surface() {
        let surface = RecordingAlertSurface::new();
        surface.show_alert("Server Error", "try later");
        assert_eq!(
            surface.alerts(),
            vec![("Server Error".to_string(), "try later".to_string())]
        );
        assert_eq!(surface.titles(), vec!["Server Error".to_string()]);
    }
}
