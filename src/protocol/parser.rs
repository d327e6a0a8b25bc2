//! Incremental RESP Frame Codec
//!
//! This module splits a growing TCP byte buffer into complete command
//! frames and parses a frame into its argument tokens. The two jobs are
//! deliberately separate:
//!
//! 1. [`split_frames`] consumes every *complete* frame at the head of the
//!    buffer and never touches the bytes of a partial frame, so it is safe
//!    to call again whenever more bytes arrive, regardless of how TCP
//!    fragmented the stream.
//! 2. [`parse_tokens`] turns one complete frame into its argument vector.
//!    Tokens are zero-copy slices of the frame buffer (`Bytes` handles
//!    sharing the same allocation).
//!
//! ## Recognized grammar
//!
//! A frame is `*<n>\r\n` followed by exactly `n` bulk strings of the form
//! `$<len>\r\n<len bytes>\r\n`. As a tolerant fallback, a frame whose
//! first byte is not `*` is treated as an inline command terminated by
//! `\r\n` with whitespace-split tokens.
//!
//! ## Error model
//!
//! Missing bytes are never an error: the scanner answers "incomplete" and
//! the caller waits for more data. A [`FrameError`] is only returned for a
//! conclusive protocol violation that more bytes cannot repair (a non-digit
//! length prefix, a negative length, a missing `$` marker, payload not
//! followed by CRLF).

use crate::protocol::types::CRLF;
use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Maximum number of elements in a single command frame.
pub const MAX_FRAME_ELEMENTS: i64 = 1_000_000;

/// Maximum length of a single bulk string (512 MiB, same as Redis).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// A conclusive protocol violation found while scanning a frame.
///
/// These are only raised when the offending bytes have actually been
/// received; an incomplete frame is reported as "no frame yet" instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A length prefix contained something other than decimal digits.
    #[error("invalid length prefix")]
    BadLengthPrefix,

    /// The element count of an array frame is negative or over the limit.
    #[error("element count out of range: {0}")]
    ElementCountOutOfRange(i64),

    /// A bulk length is over the limit or negative (other than `-1`).
    #[error("bulk length out of range: {0}")]
    BulkLenOutOfRange(i64),

    /// A null bulk (`$-1`) appeared where a command argument was expected.
    #[error("null bulk string not allowed in command frame")]
    NullBulk,

    /// An array element did not start with the `$` bulk marker.
    #[error("expected bulk string marker")]
    ExpectedBulk,

    /// A bulk payload was not followed by CRLF.
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,
}

/// Result type for frame scanning.
pub type FrameResult<T> = Result<T, FrameError>;

/// Splits every complete frame off the head of `buf`.
///
/// Complete frames are removed from the buffer and returned as cheap
/// `Bytes` views into the drained region; bytes belonging to a partial
/// frame stay in the buffer untouched. If a conclusive protocol violation
/// is found, splitting stops at the offending boundary and the violation
/// is returned alongside the frames that were split before it.
pub fn split_frames(buf: &mut BytesMut) -> (Vec<Bytes>, Option<FrameError>) {
    let mut frames = Vec::new();

    loop {
        match scan_frame(buf) {
            Ok(Some(len)) => frames.push(buf.split_to(len).freeze()),
            Ok(None) => return (frames, None),
            Err(e) => return (frames, Some(e)),
        }
    }
}

/// Scans the head of `buf` for one complete frame.
///
/// Returns `Ok(Some(len))` with the frame's total byte length,
/// `Ok(None)` if the frame is not yet complete, or a [`FrameError`] for a
/// conclusive violation.
pub fn scan_frame(buf: &[u8]) -> FrameResult<Option<usize>> {
    if buf.is_empty() {
        return Ok(None);
    }

    // Inline fallback: anything not starting with '*' is a single
    // CRLF-terminated line.
    if buf[0] != b'*' {
        return Ok(find_crlf(buf).map(|pos| pos + 2));
    }

    let count_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let count = parse_decimal(&buf[1..1 + count_end])?;
    if !(0..=MAX_FRAME_ELEMENTS).contains(&count) {
        return Err(FrameError::ElementCountOutOfRange(count));
    }

    let mut cursor = 1 + count_end + 2;

    for _ in 0..count {
        if cursor >= buf.len() {
            return Ok(None);
        }
        if buf[cursor] != b'$' {
            return Err(FrameError::ExpectedBulk);
        }

        let len_end = match find_crlf(&buf[cursor + 1..]) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let len = parse_decimal(&buf[cursor + 1..cursor + 1 + len_end])?;
        if len == -1 {
            return Err(FrameError::NullBulk);
        }
        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Err(FrameError::BulkLenOutOfRange(len));
        }
        let len = len as usize;

        let data_start = cursor + 1 + len_end + 2;
        let frame_end = data_start + len + 2;
        if buf.len() < frame_end {
            return Ok(None);
        }
        if &buf[data_start + len..frame_end] != CRLF {
            return Err(FrameError::MissingCrlf);
        }

        cursor = frame_end;
    }

    Ok(Some(cursor))
}

/// Parses one complete frame into its argument tokens.
///
/// The first token is the command name. Tokens are zero-copy slices of the
/// frame buffer. Ill-formed frames yield an empty vector; in particular the
/// empty array frame `*0\r\n` parses to zero tokens.
pub fn parse_tokens(frame: &Bytes) -> Vec<Bytes> {
    if frame.is_empty() {
        return Vec::new();
    }

    if frame[0] != b'*' {
        return parse_inline(frame);
    }

    let count_end = match find_crlf(&frame[1..]) {
        Some(pos) => pos,
        None => return Vec::new(),
    };
    let count = match parse_decimal(&frame[1..1 + count_end]) {
        Ok(n) if (0..=MAX_FRAME_ELEMENTS).contains(&n) => n as usize,
        _ => return Vec::new(),
    };

    let mut tokens = Vec::with_capacity(count);
    let mut cursor = 1 + count_end + 2;

    for _ in 0..count {
        if cursor >= frame.len() || frame[cursor] != b'$' {
            return Vec::new();
        }
        let len_end = match find_crlf(&frame[cursor + 1..]) {
            Some(pos) => pos,
            None => return Vec::new(),
        };
        let len = match parse_decimal(&frame[cursor + 1..cursor + 1 + len_end]) {
            Ok(n) if (0..=MAX_BULK_LEN).contains(&n) => n as usize,
            _ => return Vec::new(),
        };

        let data_start = cursor + 1 + len_end + 2;
        if frame.len() < data_start + len + 2 {
            return Vec::new();
        }

        tokens.push(frame.slice(data_start..data_start + len));
        cursor = data_start + len + 2;
    }

    tokens
}

/// Splits an inline command line into whitespace-separated tokens.
fn parse_inline(frame: &Bytes) -> Vec<Bytes> {
    let line_end = match find_crlf(frame) {
        Some(pos) => pos,
        None => frame.len(),
    };

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < line_end {
        while i < line_end && frame[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= line_end {
            break;
        }
        let start = i;
        while i < line_end && !frame[i].is_ascii_whitespace() {
            i += 1;
        }
        tokens.push(frame.slice(start..i));
    }

    tokens
}

/// Parses a decimal integer with an optional leading minus.
///
/// A minus sign is accepted here only so that negative lengths can be
/// range-checked by the caller; any other non-digit is a violation.
fn parse_decimal(digits: &[u8]) -> FrameResult<i64> {
    if digits.is_empty() {
        return Err(FrameError::BadLengthPrefix);
    }

    let (negative, digits) = match digits[0] {
        b'-' => (true, &digits[1..]),
        _ => (false, digits),
    };
    if digits.is_empty() {
        return Err(FrameError::BadLengthPrefix);
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(FrameError::BadLengthPrefix);
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as i64))
            .ok_or(FrameError::BadLengthPrefix)?;
    }

    Ok(if negative { -value } else { value })
}

/// Finds the position of the first CRLF in the buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}
