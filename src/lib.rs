//! # EmberKV - A Redis-Compatible In-Memory Key-Value Server
//!
//! EmberKV speaks the RESP wire protocol over TCP, stores strings, lists,
//! and hashes with per-key TTL, and periodically snapshots the whole
//! keyspace to a local file for restart recovery.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            EmberKV                               │
//! │                                                                  │
//! │  ┌──────────┐    ┌────────────┐    ┌───────────┐   ┌──────────┐  │
//! │  │  Server  │───>│ Connection │───>│  Command  │──>│ Keyspace │  │
//! │  │ (accept) │    │  Handler   │    │ Dispatcher│   │ (mutex)  │  │
//! │  └──────────┘    └─────┬──────┘    └───────────┘   └────┬─────┘  │
//! │                        │                                │        │
//! │                  ┌─────┴──────┐               ┌─────────┴──────┐ │
//! │                  │ RESP frame │               │ ExpirySweeper  │ │
//! │                  │   codec    │               │ SnapshotWorker │ │
//! │                  └────────────┘               └────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bytes arrive at the connection handler, accumulate in a per-connection
//! buffer, are split by the codec into complete frames, each frame is
//! parsed into an argument vector, the dispatcher executes it against the
//! keyspace under its lock, and the encoded reply is written back to the
//! socket. Orthogonally, the snapshot worker periodically dumps the
//! keyspace to `dump.my_rdb`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP frame codec and reply types
//! - [`storage`]: keyspace, TTL sweeper, snapshot persistence
//! - [`commands`]: command dispatcher
//! - [`connection`]: per-client connection handling
//! - [`server`]: listener, bounded accept loop, shutdown coordination
//! - [`logging`]: hourly-rotated log files under `logs/`
//!
//! ## Quick Start
//!
//! ```ignore
//! use emberkv::server::{Server, ServerConfig};
//! use emberkv::storage::{snapshot, Keyspace};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let keyspace = Arc::new(Keyspace::new());
//!     snapshot::load(&keyspace, std::path::Path::new(emberkv::SNAPSHOT_FILE))?;
//!
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     Server::new(keyspace, ServerConfig::default())
//!         .run(shutdown_rx)
//!         .await
//! }
//! ```

pub mod commands;
pub mod connection;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionError, ConnectionStats};
pub use protocol::{parse_tokens, split_frames, FrameError, RespValue};
pub use server::{Server, ServerConfig};
pub use storage::{ExpirySweeper, Keyspace, KeyspaceError, SnapshotWorker};

/// The default port the server listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// Snapshot file written in the working directory
pub const SNAPSHOT_FILE: &str = "dump.my_rdb";

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
