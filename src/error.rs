/*!
 * Error types for Tether
 *
 * Execution failures never surface as errors: `execute` folds them into an
 * `ExecutionResult`. `TetherError` covers the ambient plumbing around it
 * (configuration files, logging setup).
 */

use thiserror::Error;

pub use tether_core_resilience::{ErrorClass, ErrorKind, OperationError, ResilienceError};

pub type Result<T> = std::result::Result<T, TetherError>;

#[derive(Error, Debug)]
pub enum TetherError {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be parsed
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Log filter or subscriber setup failed
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
