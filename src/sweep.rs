//! Background sweep of expired cache entries
//!
//! Disk namespaces have no size limit, so stale records would pile up
//! between reads. The sweep periodically purges them and reports each pass
//! over a tokio channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::services::DetailServices;

/// Messages sent from the sweep task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepMessage {
    /// A sweep pass started
    SweepStarted,
    /// A sweep pass finished
    SweepCompleted {
        /// Entries removed across all caches
        removed: usize,
    },
}

/// Configuration for the sweep interval
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweep passes
    pub interval: Duration,
    /// Whether the sweep runs at all
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1800), // 30 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background sweep
pub struct SweepHandle {
    /// Channel for receiving sweep messages
    pub receiver: mpsc::Receiver<SweepMessage>,
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepHandle {
    /// Spawns the sweep task
    ///
    /// The first pass runs one full interval after spawning.
    pub fn spawn(config: SweepConfig, services: Arc<DetailServices>) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let _ = msg_tx.send(SweepMessage::SweepStarted).await;
                            let removed = services.purge_expired();
                            debug!(removed, "cache sweep pass finished");
                            let _ = msg_tx.send(SweepMessage::SweepCompleted { removed }).await;
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Returns the next pending message, if any, without waiting
    pub fn try_next(&mut self) -> Option<SweepMessage> {
        self.receiver.try_recv().ok()
    }

    /// Stops the sweep task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
