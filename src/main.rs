/*!
 * Tether CLI - exercise the resilient-execution layer from the shell
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tether::{
    config::{LogLevel, TetherConfig},
    logging, OperationError, RawConnectivityEvent, ResilientExecutor,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "tether")]
#[command(version, about = "Retry, timeout, fallback and offline replay for network operations", long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted flaky operation and print the result as JSON
    Simulate {
        /// Configuration file (TOML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Attempts that fail before the operation succeeds
        #[arg(long, default_value = "2")]
        failures: u32,

        /// HTTP status returned by failing attempts
        #[arg(long, default_value = "503")]
        status: u16,

        /// Start offline; the operation is queued as critical
        #[arg(long)]
        offline: bool,

        /// Value served by the fallback, if any
        #[arg(long)]
        fallback: Option<u32>,
    },

    /// Print the default configuration as TOML
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            failures,
            status,
            offline,
            fallback,
        } => {
            let mut config = match config {
                Some(path) => TetherConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config file {}", path.display()))?,
                None => TetherConfig::default(),
            };
            if let Some(level) = cli.log_level {
                config.log_level = level.into();
            }
            config.verbose |= cli.verbose;
            logging::init_logging(&config).context("Failed to initialize logging")?;

            simulate(config, failures, status, offline, fallback).await
        }
        Commands::Config { output } => {
            let config = TetherConfig::default();
            match output {
                Some(path) => {
                    config
                        .to_file(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote default configuration to {}", path.display());
                }
                None => print!("{}", config.to_toml()?),
            }
            Ok(())
        }
    }
}

async fn simulate(
    config: TetherConfig,
    failures: u32,
    status: u16,
    offline: bool,
    fallback: Option<u32>,
) -> Result<()> {
    let executor = ResilientExecutor::new(config);
    if offline {
        executor.handle_raw_event(RawConnectivityEvent::offline());
    }

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let mut spec = executor
        .operation(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < failures {
                    Err(OperationError::status(
                        status,
                        format!("simulated failure {} of {}", attempt + 1, failures),
                    ))
                } else {
                    Ok(attempt + 1)
                }
            }
        })
        .with_label("simulated request")
        .critical(offline)
        .alert_on_failure(true);

    if let Some(value) = fallback {
        spec = spec.with_fallback(move || async move { Ok(value) });
    }

    let result = executor.execute(spec).await;
    info!(
        attempts = attempts.load(Ordering::SeqCst),
        queued = executor.replay_queue().len(),
        "Simulation finished"
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
