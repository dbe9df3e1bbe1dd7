//! Raw connectivity event sources
//!
//! The platform pushes connectivity changes; a [`ConnectivitySource`] is
//! anything that yields them one at a time. [`ResilientExecutor::spawn_connectivity_pump`]
//! forwards a source into the executor until the source ends or the
//! shutdown token fires.
//!
//! ```no_run
//! use tether::{RawConnectivityEvent, ResilientExecutor};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = ResilientExecutor::new_default();
//!     let (tx, rx) = mpsc::channel(16);
//!     let pump = executor.spawn_connectivity_pump(rx, CancellationToken::new());
//!
//!     tx.send(RawConnectivityEvent::offline()).await.ok();
//!     drop(tx);
//!     pump.await.ok();
//! }
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::executor::ResilientExecutor;
use tether_core_resilience::RawConnectivityEvent;

/// Push-style producer of raw connectivity events
#[async_trait]
pub trait ConnectivitySource: Send {
    /// Next event, or `None` once the source is closed
    async fn next_event(&mut self) -> Option<RawConnectivityEvent>;
}

#[async_trait]
impl ConnectivitySource for mpsc::Receiver<RawConnectivityEvent> {
    async fn next_event(&mut self) -> Option<RawConnectivityEvent> {
        self.recv().await
    }
}

#[async_trait]
impl ConnectivitySource for mpsc::UnboundedReceiver<RawConnectivityEvent> {
    async fn next_event(&mut self) -> Option<RawConnectivityEvent> {
        self.recv().await
    }
}

/// Totals reported by a finished pump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub events: u64,
    pub transitions: u64,
    pub replays_dispatched: u64,
}

impl ResilientExecutor {
    /// Forward events from `source` until it closes or `shutdown` is cancelled
    pub fn spawn_connectivity_pump<S>(
        &self,
        mut source: S,
        shutdown: CancellationToken,
    ) -> JoinHandle<PumpSummary>
    where
        S: ConnectivitySource + 'static,
    {
        let executor = self.clone();

        tokio::spawn(async move {
            let mut summary = PumpSummary::default();
            info!("Connectivity pump started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Connectivity pump shutdown requested");
                        break;
                    }
                    event = source.next_event() => {
                        let Some(event) = event else { break };
                        summary.events += 1;

                        let update = executor.handle_raw_event(event);
                        if update.transition.is_some() {
                            summary.transitions += 1;
                        }
                        if let Some(dispatch) = update.replay {
                            summary.replays_dispatched += dispatch.len() as u64;
                        }
                    }
                }
            }

            info!(
                events = summary.events,
                transitions = summary.transitions,
                replays = summary.replays_dispatched,
                "Connectivity pump stopped"
            );
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationSpec;
    use tether_core_resilience::OperationError;

    #[tokio::test]
    async fn test_pump_forwards_until_closed() {
        let executor = ResilientExecutor::new_default();
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = executor.spawn_connectivity_pump(rx, CancellationToken::new());

        tx.send(RawConnectivityEvent::offline()).unwrap();
        tx.send(RawConnectivityEvent::offline()).unwrap();
        tx.send(RawConnectivityEvent::online("wifi", Some(true))).unwrap();
        drop(tx);

        let summary = pump.await.unwrap();
        assert_eq!(summary.events, 3);
        assert_eq!(summary.transitions, 2);
        assert!(executor.is_available());
    }

    #[tokio::test]
    async fn test_pump_drains_queue_on_reconnect() {
        let executor = ResilientExecutor::new_default();
        let (tx, rx) = mpsc::channel(4);
        let pump = executor.spawn_connectivity_pump(rx, CancellationToken::new());

        tx.send(RawConnectivityEvent::offline()).await.unwrap();
        tokio::task::yield_now().await;
        while executor.is_available() {
            tokio::task::yield_now().await;
        }

        let spec = OperationSpec::new(|| async { Ok::<_, OperationError>(()) }).critical(true);
        executor.execute(spec).await;
        assert_eq!(executor.replay_queue().len(), 1);

        tx.send(RawConnectivityEvent::online("wifi", None)).await.unwrap();
        drop(tx);

        let summary = pump.await.unwrap();
        assert_eq!(summary.replays_dispatched, 1);
        assert!(executor.replay_queue().is_empty());
    }

    #[tokio::test]
    async fn test_pump_stops_on_shutdown() {
        let executor = ResilientExecutor::new_default();
        let (_tx, rx) = mpsc::channel::<RawConnectivityEvent>(1);
        let shutdown = CancellationToken::new();
        let pump = executor.spawn_connectivity_pump(rx, shutdown.clone());

        shutdown.cancel();
        assert_eq!(pump.await.unwrap().events, 0);
    }
}
