//! RESP (Redis Serialization Protocol) Frame Types
//!
//! This module defines the frame type exchanged with a Redis-compatible
//! store. redmap sits on both sides of the wire: the blocking store client
//! encodes command frames and decodes reply frames, while the development
//! server decodes command frames and encodes reply frames.
//!
//! ## Protocol Format
//!
//! Each RESP frame starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String
//! - `*` Array
//!
//! All frames are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Integer: `:2\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Command: `*3\r\n$4\r\nHGET\r\n$4\r\nname\r\n$3\r\nkey\r\n`
//! Null Bulk String: `$-1\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in the RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP frame type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP frame.
///
/// Commands are arrays of bulk strings; replies may be any variant.
/// `Null` covers both the null bulk string and the null array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Non-binary-safe string without CRLF. Format: `+<string>\r\n`
    Simple(String),

    /// Error reply. Format: `-<message>\r\n`
    Error(String),

    /// 64-bit signed integer. Format: `:<integer>\r\n`
    Integer(i64),

    /// Binary-safe string. Format: `$<length>\r\n<data>\r\n`
    Bulk(Bytes),

    /// Null bulk string (`$-1\r\n`) or null array (`*-1\r\n`)
    Null,

    /// Array of frames. Format: `*<count>\r\n<frame>...`
    Array(Vec<Frame>),
}

impl Frame {
    /// Creates a simple string frame.
    pub fn simple(s: impl Into<String>) -> Self {
        Frame::Simple(s.into())
    }

    /// Creates an error frame.
    pub fn error(s: impl Into<String>) -> Self {
        Frame::Error(s.into())
    }

    /// Creates an integer frame.
    pub fn integer(n: i64) -> Self {
        Frame::Integer(n)
    }

    /// Creates a bulk string frame.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::Bulk(data.into())
    }

    /// Creates an array frame.
    pub fn array(frames: Vec<Frame>) -> Self {
        Frame::Array(frames)
    }

    /// The `+OK` reply.
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    /// Builds a command frame: an array of bulk strings.
    ///
    /// This is the only frame shape a Redis-compatible server accepts as
    /// input, e.g. `Frame::command(&[b"HGET", name, field])`.
    pub fn command<A: AsRef<[u8]>>(args: &[A]) -> Self {
        Frame::Array(
            args.iter()
                .map(|a| Frame::Bulk(Bytes::copy_from_slice(a.as_ref())))
                .collect(),
        )
    }

    /// Serializes the frame to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Serializes the frame into an existing buffer.
    ///
    /// More efficient than [`Frame::encode`] when a buffer is reused
    /// across requests.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Frame::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Frame::Bulk(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Frame::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            Frame::Array(frames) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(frames.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for frame in frames {
                    frame.encode_into(buf);
                }
            }
        }
    }

    /// Returns true if this frame is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null)
    }

    /// Returns true if this frame is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Extracts the inner text from `Simple` or `Bulk` frames.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Frame::Simple(s) => Some(s),
            Frame::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Extracts the inner bytes from a `Bulk` frame.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Frame::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Extracts the inner integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Frame::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Extracts the inner array.
    pub fn as_array(&self) -> Option<&[Frame]> {
        match self {
            Frame::Array(frames) => Some(frames),
            _ => None,
        }
    }

    /// Consumes self and returns the inner array if this is an `Array`.
    pub fn into_array(self) -> Option<Vec<Frame>> {
        match self {
            Frame::Array(frames) => Some(frames),
            _ => None,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "\"{}\"", s),
            Frame::Error(s) => write!(f, "(error) {}", s),
            Frame::Integer(n) => write!(f, "(integer) {}", n),
            Frame::Bulk(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Frame::Null => write!(f, "(nil)"),
            Frame::Array(frames) => {
                if frames.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    writeln!(f)?;
                    for (i, frame) in frames.iter().enumerate() {
                        writeln!(f, "{}) {}", i + 1, frame)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
