//! Server Supervisor
//!
//! Owns the listen socket and everything around it: the bounded accept
//! loop, the background expiry sweeper, the periodic snapshot worker, and
//! graceful shutdown. The socket is created with `SO_REUSEADDR` set and a
//! listen backlog of 128.
//!
//! Concurrency is bounded by a semaphore sized to the hardware
//! concurrency; the accept loop waits for a permit before accepting, so
//! excess clients queue in the listen backlog instead of spawning
//! unbounded tasks. On shutdown the listener stops, in-flight connection
//! tasks are drained to completion, and the snapshot worker writes one
//! final dump.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpSocket;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::{expiry, snapshot, ExpirySweeper, Keyspace, SnapshotWorker};

/// Listen backlog for pending connections.
const LISTEN_BACKLOG: u32 = 128;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Maximum concurrently handled connections. Defaults to the number of
    /// available CPUs.
    pub max_connections: usize,
    /// Snapshot file path.
    pub snapshot_path: PathBuf,
    /// Interval between automatic snapshots.
    pub snapshot_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            max_connections: num_cpus::get(),
            snapshot_path: PathBuf::from(crate::SNAPSHOT_FILE),
            snapshot_interval: snapshot::SNAPSHOT_INTERVAL,
        }
    }
}

/// The server supervisor.
pub struct Server {
    keyspace: Arc<Keyspace>,
    config: ServerConfig,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Creates a supervisor over an already-loaded keyspace.
    pub fn new(keyspace: Arc<Keyspace>, config: ServerConfig) -> Self {
        Self {
            keyspace,
            config,
            stats: Arc::new(ConnectionStats::new()),
        }
    }

    /// Runs the server until `shutdown_rx` observes `true`.
    ///
    /// Binding failures are fatal and reported to the caller; everything
    /// after a successful bind is handled internally.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let socket = TcpSocket::new_v4().context("failed to create listen socket")?;
        socket
            .set_reuseaddr(true)
            .context("failed to set SO_REUSEADDR")?;
        socket
            .bind(addr)
            .with_context(|| format!("failed to bind {}", addr))?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .with_context(|| format!("failed to listen on {}", addr))?;
        info!(
            address = %addr,
            max_connections = self.config.max_connections,
            "Server listening"
        );

        let sweeper = ExpirySweeper::start(Arc::clone(&self.keyspace), expiry::SWEEP_INTERVAL);
        let snapshot_worker = SnapshotWorker::start(
            Arc::clone(&self.keyspace),
            self.config.snapshot_path.clone(),
            self.config.snapshot_interval,
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let mut connection_tasks = JoinSet::new();

        loop {
            // Wait for a free worker slot before accepting, so pending
            // clients queue in the listen backlog.
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => {
                    permit.expect("connection semaphore closed")
                }
                _ = shutdown_rx.changed() => break,
            };

            let (stream, peer_addr) = tokio::select! {
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
                _ = shutdown_rx.changed() => break,
            };

            let handler = CommandHandler::new(Arc::clone(&self.keyspace));
            let stats = Arc::clone(&self.stats);
            let shutdown = shutdown_rx.clone();

            connection_tasks.spawn(async move {
                let _permit = permit;
                handle_connection(stream, peer_addr, handler, stats, shutdown).await;
            });

            // Reap finished tasks so the set does not grow without bound.
            while connection_tasks.try_join_next().is_some() {}
        }

        info!(
            in_flight = connection_tasks.len(),
            "Shutting down, draining connections"
        );
        while let Some(result) = connection_tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Connection task panicked");
            }
        }

        drop(sweeper);
        snapshot_worker.shutdown().await;
        info!("Server shutdown complete");
        Ok(())
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }
}
