//! Background Expiry Sweeper
//!
//! Lazy expiry only reclaims a key when something touches it. A key that
//! expires and is never read again would sit in memory forever, so this
//! task periodically asks the keyspace to run its full sweep.
//!
//! The keyspace rate-limits sweeps internally, so the tick interval here
//! only controls how promptly orphaned keys are noticed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::storage::Keyspace;

/// Default gap between sweeper ticks.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to the running sweeper task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the sweeper as a background task.
    pub fn start(keyspace: Arc<Keyspace>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweeper_loop(keyspace, interval, shutdown_rx));
        info!(interval_ms = interval.as_millis() as u64, "Expiry sweeper started");
        Self { shutdown_tx }
    }

    /// Stops the sweeper. Called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    keyspace: Arc<Keyspace>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let dropped = keyspace.purge_expired();
        if dropped > 0 {
            debug!(dropped = dropped, "Expired keys reclaimed");
        }
    }
}
