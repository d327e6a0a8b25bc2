//! RESP (Redis Serialization Protocol) Reply Types
//!
//! This module defines the reply values the server sends back to clients.
//! RESP is a simple, binary-safe protocol; every reply starts with a type
//! prefix byte and is terminated with CRLF (`\r\n`).
//!
//! ## Protocol Format
//!
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String (length-prefixed, binary safe; `$-1` is the null bulk)
//! - `*` Array
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Array: `*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n`
//!
//! Encoding goes through [`RespValue::write_to`], which streams the wire
//! form into any [`std::io::Write`] target — the connection handler hands
//! it the per-connection reply buffer.

use bytes::Bytes;
use std::io::{self, Write};

/// The CRLF terminator used in the RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// A reply value in the RESP protocol.
///
/// The command dispatcher builds these and the connection handler
/// serializes them onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe string used for acknowledgments (`+OK\r\n`).
    SimpleString(String),

    /// Error reply (`-ERR <message>\r\n`).
    Error(String),

    /// 64-bit signed integer (`:<n>\r\n`).
    Integer(i64),

    /// Binary-safe, length-prefixed string (`$<len>\r\n<data>\r\n`).
    BulkString(Bytes),

    /// Null bulk string (`$-1\r\n`), the ABSENT reply.
    Null,

    /// Array of replies (`*<count>\r\n<elements...>`).
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Creates a simple string reply.
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Creates an integer reply.
    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a bulk string reply.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Creates the null (ABSENT) reply.
    pub fn null() -> Self {
        RespValue::Null
    }

    /// Creates an array reply.
    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// The `+OK` acknowledgment.
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// The `+PONG` reply.
    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Streams the wire encoding of this reply into `out`.
    ///
    /// Headers are formatted directly into the writer; bulk payloads are
    /// copied verbatim between their length line and the closing CRLF.
    /// Arrays recurse element by element, so nested replies never need an
    /// intermediate allocation.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            RespValue::SimpleString(s) => write!(out, "+{}\r\n", s),
            RespValue::Error(s) => write!(out, "-{}\r\n", s),
            RespValue::Integer(n) => write!(out, ":{}\r\n", n),
            RespValue::BulkString(data) => {
                write!(out, "${}\r\n", data.len())?;
                out.write_all(data)?;
                out.write_all(CRLF)
            }
            RespValue::Null => out.write_all(b"$-1\r\n"),
            RespValue::Array(values) => {
                write!(out, "*{}\r\n", values.len())?;
                values.iter().try_for_each(|value| value.write_to(out))
            }
        }
    }

    /// Serializes the reply to a fresh byte vector.
    ///
    /// Convenience over [`write_to`](Self::write_to) for callers without a
    /// buffer to reuse.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)
            .expect("writing to an in-memory buffer cannot fail");
        buf
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_string_serialize() {
        let value = RespValue::simple_string("OK");
        assert_eq!(value.serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_error_serialize() {
        let value = RespValue::error("ERR unknown command");
        assert_eq!(value.serialize(), b"-ERR unknown command\r\n");
    }

    #[test]
    fn test_integer_serialize() {
        let value = RespValue::integer(1000);
        assert_eq!(value.serialize(), b":1000\r\n");

        let negative = RespValue::integer(-2);
        assert_eq!(negative.serialize(), b":-2\r\n");
    }

    #[test]
    fn test_bulk_string_serialize() {
        let value = RespValue::bulk_string(Bytes::from("hello"));
        assert_eq!(value.serialize(), b"$5\r\nhello\r\n");
    }

    #[test]
    fn test_binary_bulk_string_serialize() {
        let value = RespValue::bulk_string(Bytes::from(&b"a\x00b\r\nc"[..]));
        assert_eq!(value.serialize(), b"$6\r\na\x00b\r\nc\r\n");
    }

    #[test]
    fn test_null_serialize() {
        let value = RespValue::null();
        assert_eq!(value.serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_array_serialize() {
        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("a")),
            RespValue::bulk_string(Bytes::from("b")),
            RespValue::bulk_string(Bytes::from("c")),
        ]);
        assert_eq!(value.serialize(), b"*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n");
    }

    #[test]
    fn test_empty_array_serialize() {
        assert_eq!(RespValue::array(vec![]).serialize(), b"*0\r\n");
    }

    #[test]
    fn test_nested_array_serialize() {
        let value = RespValue::array(vec![
            RespValue::integer(1),
            RespValue::array(vec![RespValue::bulk_string(Bytes::from("x"))]),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n:1\r\n*1\r\n$1\r\nx\r\n");
    }

    #[test]
    fn test_write_to_appends_to_existing_buffer() {
        let mut buf = Vec::new();
        RespValue::ok().write_to(&mut buf).unwrap();
        RespValue::integer(7).write_to(&mut buf).unwrap();
        assert_eq!(buf, b"+OK\r\n:7\r\n");
    }

    #[test]
    fn test_ok_and_pong() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
        assert_eq!(RespValue::pong().serialize(), b"+PONG\r\n");
    }
}
