//! Storage Module
//!
//! The keyspace and everything that keeps it healthy and durable:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Keyspace                             │
//! │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌────────────┐   │
//! │   │ strings  │  │  lists   │  │  hashes  │  │ deadlines  │   │
//! │   └──────────┘  └──────────┘  └──────────┘  └────────────┘   │
//! │                  one global mutex around all four            │
//! └──────────────────────────────────────────────────────────────┘
//!          ▲                                   ▲
//!          │                                   │
//! ┌────────┴─────────┐               ┌─────────┴─────────┐
//! │  ExpirySweeper   │               │  SnapshotWorker   │
//! │ (reclaims keys   │               │ (periodic dump to │
//! │  nobody touches) │               │  dump.my_rdb)     │
//! └──────────────────┘               └───────────────────┘
//! ```
//!
//! - [`Keyspace`]: thread-safe typed stores with per-key TTL
//! - [`snapshot`]: length-prefixed dump/load plus the periodic worker
//! - [`ExpirySweeper`]: background reclamation of expired keys

pub mod expiry;
pub mod keyspace;
pub mod snapshot;

// Re-export commonly used types
pub use expiry::{ExpirySweeper, SWEEP_INTERVAL};
pub use keyspace::{KeyType, Keyspace, KeyspaceError, KeyspaceResult};
pub use snapshot::{SnapshotWorker, SNAPSHOT_INTERVAL};
