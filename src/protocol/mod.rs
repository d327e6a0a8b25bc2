//! RESP Protocol Implementation
//!
//! This module implements the wire protocol layer: splitting the TCP byte
//! stream into complete command frames, parsing frames into argument
//! tokens, and serializing replies.
//!
//! ## Modules
//!
//! - `types`: the [`RespValue`] reply enum and its wire encoding
//! - `parser`: the incremental, zero-copy frame codec
//!
//! ## Example
//!
//! ```ignore
//! use emberkv::protocol::{split_frames, parse_tokens, RespValue};
//! use bytes::BytesMut;
//!
//! let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n"[..]);
//! let (frames, err) = split_frames(&mut buf);
//! assert!(err.is_none());
//! let tokens = parse_tokens(&frames[0]);   // ["GET", "name"]
//!
//! let reply = RespValue::bulk_string("Alice");
//! let bytes = reply.serialize();
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used items for convenience
pub use parser::{parse_tokens, scan_frame, split_frames, FrameError, FrameResult};
pub use types::RespValue;
