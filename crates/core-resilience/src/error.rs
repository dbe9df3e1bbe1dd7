//! Error taxonomy for resilient execution
//!
//! Transports report failures as an [`OperationError`] tagged with an
//! [`ErrorKind`]. The tag is assigned once, where the failure happens, and the
//! rest of the stack works on the typed [`ResilienceError`] it converts into.

use thiserror::Error;

/// What went wrong inside a wrapped operation, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request did not complete in time
    Timeout,
    /// The connection could not be established
    ConnectionFailed,
    /// The connection dropped mid-request
    ConnectionReset,
    /// The server answered with a 5xx-class status
    ServerError(u16),
    /// The server answered with a 4xx-class status
    ClientError(u16),
    /// The request was rejected before it reached the wire
    Validation,
    /// Anything else (business-logic errors, decoding failures, ...)
    Other,
}

/// Error returned by a wrapped operation or fallback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct OperationError {
    /// Typed cause, used for classification
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl OperationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message)
    }

    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionReset, message)
    }

    /// Error for an HTTP-style status code; 5xx maps to `ServerError`,
    /// everything else to `ClientError`.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        let kind = if (500..=599).contains(&code) {
            ErrorKind::ServerError(code)
        } else {
            ErrorKind::ClientError(code)
        };
        Self::new(kind, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }
}

/// Retry eligibility of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Likely to succeed if tried again
    Transient,
    /// Will fail the same way every time
    Permanent,
}

/// Category used to pick a user-facing alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCategory {
    Timeout,
    ServerError,
    Generic,
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCategory::Timeout => write!(f, "timeout"),
            AlertCategory::ServerError => write!(f, "server-error"),
            AlertCategory::Generic => write!(f, "generic"),
        }
    }
}

/// Terminal error of a resilient execution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResilienceError {
    /// No connectivity and no fallback to substitute
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// An attempt exceeded its deadline
    #[error("Attempt timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The transport gave up waiting before the attempt deadline
    #[error("Transport timed out: {message}")]
    TransportTimeout { message: String },

    /// Connection could not be established or was reset
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// 5xx-class server response
    #[error("Server error {status}: {message}")]
    TransientServerError { status: u16, message: String },

    /// 4xx-class response or validation failure
    #[error("Client error{}: {message}", .status.map(|s| format!(" {}", s)).unwrap_or_default())]
    PermanentClientError { status: Option<u16>, message: String },

    /// The fallback itself failed
    #[error("Fallback failed: {source}")]
    FallbackFailure { source: OperationError },

    /// The attempt was cancelled by a global cancel
    #[error("Operation cancelled")]
    Cancelled,

    /// Uncategorized operation failure
    #[error("{0}")]
    Other(String),
}

impl ResilienceError {
    /// Classification of this error for retry purposes
    pub fn class(&self) -> ErrorClass {
        match self {
            ResilienceError::Timeout { .. }
            | ResilienceError::TransportTimeout { .. }
            | ResilienceError::Connection { .. }
            | ResilienceError::TransientServerError { .. }
            | ResilienceError::NetworkUnavailable
            | ResilienceError::Cancelled => ErrorClass::Transient,

            ResilienceError::PermanentClientError { .. }
            | ResilienceError::FallbackFailure { .. }
            | ResilienceError::Other(_) => ErrorClass::Permanent,
        }
    }

    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Check if this error is permanent (must not be retried)
    pub fn is_permanent(&self) -> bool {
        self.class() == ErrorClass::Permanent
    }

    /// Alert category for user-visible notifications
    pub fn alert_category(&self) -> AlertCategory {
        match self {
            ResilienceError::Timeout { .. } | ResilienceError::TransportTimeout { .. } => {
                AlertCategory::Timeout
            }
            ResilienceError::TransientServerError { .. } => AlertCategory::ServerError,
            _ => AlertCategory::Generic,
        }
    }
}

impl From<OperationError> for ResilienceError {
    fn from(err: OperationError) -> Self {
        match err.kind {
            ErrorKind::Timeout => ResilienceError::TransportTimeout {
                message: err.message,
            },
            ErrorKind::ConnectionFailed | ErrorKind::ConnectionReset => {
                ResilienceError::Connection {
                    message: err.message,
                }
            }
            ErrorKind::ServerError(status) if (500..=599).contains(&status) => {
                ResilienceError::TransientServerError {
                    status,
                    message: err.message,
                }
            }
            ErrorKind::ServerError(status) | ErrorKind::ClientError(status) => {
                ResilienceError::PermanentClientError {
                    status: Some(status),
                    message: err.message,
                }
            }
            ErrorKind::Validation => ResilienceError::PermanentClientError {
                status: None,
                message: err.message,
            },
            ErrorKind::Other => ResilienceError::Other(err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_constructor_splits_on_5xx() {
        assert_eq!(
            OperationError::status(503, "unavailable").kind,
            ErrorKind::ServerError(503)
        );
        assert_eq!(
            OperationError::status(404, "missing").kind,
            ErrorKind::ClientError(404)
        );
    }

    #[test]
    fn test_conversion_into_taxonomy() {
        let err: ResilienceError = OperationError::status(502, "bad gateway").into();
        assert_eq!(
            err,
            ResilienceError::TransientServerError {
                status: 502,
                message: "bad gateway".to_string()
            }
        );

        let err: ResilienceError = OperationError::validation("missing field").into();
        assert_eq!(
            err,
            ResilienceError::PermanentClientError {
                status: None,
                message: "missing field".to_string()
            }
        );

        let err: ResilienceError = OperationError::connection_reset("peer reset").into();
        assert!(matches!(err, ResilienceError::Connection { .. }));
    }

    #[test]
    fn test_out_of_range_server_code_is_permanent() {
        let err: ResilienceError =
            OperationError::new(ErrorKind::ServerError(418), "teapot").into();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_classes() {
        assert!(ResilienceError::Timeout { timeout_ms: 500 }.is_transient());
        assert!(ResilienceError::Cancelled.is_transient());
        assert!(ResilienceError::Other("boom".into()).is_permanent());
        assert!(ResilienceError::FallbackFailure {
            source: OperationError::other("nope")
        }
        .is_permanent());
    }

    #[test]
    fn test_alert_categories() {
        assert_eq!(
            ResilienceError::Timeout { timeout_ms: 1 }.alert_category(),
            AlertCategory::Timeout
        );
        assert_eq!(
            ResilienceError::TransientServerError {
                status: 500,
                message: String::new()
            }
            .alert_category(),
            AlertCategory::ServerError
        );
        assert_eq!(
            ResilienceError::NetworkUnavailable.alert_category(),
            AlertCategory::Generic
        );
    }

    #[test]
    fn test_display() {
        let err = ResilienceError::PermanentClientError {
            status: Some(404),
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "Client error 404: not found");

        let err = ResilienceError::PermanentClientError {
            status: None,
            message: "bad input".to_string(),
        };
        assert_eq!(err.to_string(), "Client error: bad input");
    }

    #[test]
    fn test_transport_timeout_keeps_message() {
        let err: ResilienceError = OperationError::timeout("read timed out after 3s").into();
        assert_eq!(
            err,
            ResilienceError::TransportTimeout {
                message: "read timed out after 3s".to_string()
            }
        );
        assert_eq!(err.to_string(), "Transport timed out: read timed out after 3s");
        assert!(err.is_transient());
        assert_eq!(err.alert_category(), AlertCategory::Timeout);
    }
}
