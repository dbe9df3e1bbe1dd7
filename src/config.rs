/*!
 * Configuration types for Tether
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TetherError};
use tether_core_resilience::BackoffPolicy;

/// Main configuration for the resilient-execution layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TetherConfig {
    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Defaults applied to operations built through the executor
    #[serde(default)]
    pub operation: OperationDefaults,

    /// Offline replay queue settings
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Connectivity monitor settings
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
}

/// Retry/timeout defaults for new operation specs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDefaults {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay for each further attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound on a single backoff delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Deadline for each individual attempt, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_per_attempt_ms: u64,

    /// Randomize backoff delays
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for OperationDefaults {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
            timeout_per_attempt_ms: default_timeout_ms(),
            jitter: true,
        }
    }
}

impl OperationDefaults {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout_per_attempt(&self) -> Duration {
        Duration::from_millis(self.timeout_per_attempt_ms)
    }

    /// Backoff parameters as the retry engine expects them
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: self.initial_delay(),
            backoff_factor: self.backoff_factor,
            max_delay: self.max_delay(),
            jitter: self.jitter,
        }
    }
}

/// Offline replay queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Maximum queued operations; the oldest is dropped on overflow
    #[serde(default = "default_replay_capacity")]
    pub capacity: usize,

    /// Replays allowed per operation before it is dead-lettered
    #[serde(default = "default_max_replays")]
    pub max_replays: u32,

    /// Maximum dead-lettered operations kept for inspection
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            capacity: default_replay_capacity(),
            max_replays: default_max_replays(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

/// Connectivity monitor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Start as online (reachability unknown) until the first raw event
    #[serde(default = "default_true")]
    pub assume_online_at_start: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            assume_online_at_start: true,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_replay_capacity() -> usize {
    1000
}

fn default_max_replays() -> u32 {
    3
}

fn default_dead_letter_capacity() -> usize {
    100
}

impl TetherConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TetherConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the executor cannot honour
    pub fn validate(&self) -> Result<()> {
        let op = &self.operation;
        if !op.backoff_factor.is_finite() || op.backoff_factor < 1.0 {
            return Err(TetherError::Config(format!(
                "backoff_factor must be >= 1.0, got {}",
                op.backoff_factor
            )));
        }
        if op.timeout_per_attempt_ms == 0 {
            return Err(TetherError::Config(
                "timeout_per_attempt_ms must be greater than 0".to_string(),
            ));
        }
        if op.max_delay_ms < op.initial_delay_ms {
            return Err(TetherError::Config(format!(
                "max_delay_ms ({}) is below initial_delay_ms ({})",
                op.max_delay_ms, op.initial_delay_ms
            )));
        }
        if self.replay.capacity == 0 || self.replay.dead_letter_capacity == 0 {
            return Err(TetherError::Config(
                "replay capacities must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Quick retries with short timeouts (interactive requests)
    pub fn aggressive() -> Self {
        Self {
            operation: OperationDefaults {
                max_retries: 5,
                initial_delay_ms: 200,
                backoff_factor: 1.5,
                max_delay_ms: 5_000,
                timeout_per_attempt_ms: 3_000,
                jitter: true,
            },
            ..Default::default()
        }
    }

    /// Few, widely spaced retries with generous timeouts (bulk sync)
    pub fn patient() -> Self {
        Self {
            operation: OperationDefaults {
                max_retries: 3,
                initial_delay_ms: 5_000,
                backoff_factor: 3.0,
                max_delay_ms: 120_000,
                timeout_per_attempt_ms: 60_000,
                jitter: true,
            },
            replay: ReplayConfig {
                max_replays: 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
