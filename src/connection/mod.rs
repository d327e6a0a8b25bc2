//! Connection Handling
//!
//! One handler task per accepted client:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ConnectionHandler                     │
//! │                                                          │
//! │  ┌────────────┐   ┌─────────────┐   ┌────────────────┐   │
//! │  │ read bytes │──>│ split/parse │──>│ execute + reply│   │
//! │  └────────────┘   └─────────────┘   └────────────────┘   │
//! │        ▲                                     │           │
//! │        └─────────────────────────────────────┘           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Pipelining works out of the box: every complete frame found in the
//! buffer is dispatched and answered, in order, before the next read.

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
