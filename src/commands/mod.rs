//! Command Processing Layer
//!
//! Receives parsed argument vectors from the connection layer, executes
//! them against the keyspace, and produces the RESP reply:
//!
//! ```text
//! Client request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame codec    │  (protocol module)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │  - dispatch     │
//! │  - validate     │
//! │  - execute      │
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │    Keyspace     │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
