//! Incremental RESP Frame Parser
//!
//! TCP is a stream protocol: a read may deliver half a frame or several
//! frames at once. The parser therefore works incrementally over whatever
//! bytes have accumulated so far and reports one of three outcomes:
//!
//! - `Ok(Some((frame, consumed)))` - a complete frame, `consumed` bytes used
//! - `Ok(None)` - the buffered data is an incomplete frame, read more
//! - `Err(ParseError)` - the data violates the protocol
//!
//! The caller appends incoming bytes to a buffer, calls [`FrameParser::parse`],
//! and on success advances the buffer by `consumed`. Both the blocking store
//! client (decoding replies) and the development server (decoding commands)
//! drive the parser this way.

use crate::protocol::types::{prefix, Frame, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while decoding a RESP frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Invalid integer format in an integer frame or a length line
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string or error message
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, empty inline command, etc.)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The frame exceeds the maximum allowed size
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// An incremental RESP frame parser.
///
/// # Example
///
/// ```
/// use redmap::protocol::FrameParser;
///
/// let mut parser = FrameParser::new();
/// let buf = b"+OK\r\n";
/// let (frame, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(frame.as_str(), Some("OK"));
/// assert_eq!(consumed, 5);
/// ```
#[derive(Debug, Default)]
pub struct FrameParser {
    /// Current nesting depth while descending into arrays
    depth: usize,
}

impl FrameParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to decode one frame from the start of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        self.depth = 0;
        self.parse_frame(buf)
    }

    fn parse_frame(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::Protocol(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => self.parse_text_line(buf, Frame::Simple),
            prefix::ERROR => self.parse_text_line(buf, Frame::Error),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk(buf),
            prefix::ARRAY => self.parse_array(buf),
            // Anything else is treated as an inline command, the way
            // Redis handles hand-typed telnet input.
            _ => self.parse_inline(buf),
        }
    }

    /// Parses `+<text>\r\n` or `-<text>\r\n` into the given variant.
    fn parse_text_line(
        &mut self,
        buf: &[u8],
        variant: fn(String) -> Frame,
    ) -> ParseResult<Option<(Frame, usize)>> {
        let (line, consumed) = match take_line(&buf[1..]) {
            Some(found) => found,
            None => return Ok(None),
        };
        let text = std::str::from_utf8(line)
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?
            .to_string();
        Ok(Some((variant(text), 1 + consumed)))
    }

    /// Parses `:<integer>\r\n`.
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let (line, consumed) = match take_line(&buf[1..]) {
            Some(found) => found,
            None => return Ok(None),
        };
        Ok(Some((Frame::Integer(parse_i64(line)?), 1 + consumed)))
    }

    /// Parses `$<length>\r\n<data>\r\n`, including the `$-1\r\n` null form.
    fn parse_bulk(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let (line, header) = match take_line(&buf[1..]) {
            Some(found) => found,
            None => return Ok(None),
        };

        let len = parse_i64(line)?;
        if len == -1 {
            return Ok(Some((Frame::Null, 1 + header)));
        }
        if len < 0 {
            return Err(ParseError::InvalidBulkLength(len));
        }

        let len = len as usize;
        if len > MAX_BULK_SIZE {
            return Err(ParseError::FrameTooLarge {
                size: len,
                max: MAX_BULK_SIZE,
            });
        }

        let data_start = 1 + header;
        let total = data_start + len + CRLF.len();
        if buf.len() < total {
            return Ok(None);
        }
        if &buf[data_start + len..total] != CRLF {
            return Err(ParseError::Protocol(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + len]);
        Ok(Some((Frame::Bulk(data), total)))
    }

    /// Parses `*<count>\r\n<frame>...`, including the `*-1\r\n` null form.
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let (line, header) = match take_line(&buf[1..]) {
            Some(found) => found,
            None => return Ok(None),
        };

        let count = parse_i64(line)?;
        if count == -1 {
            return Ok(Some((Frame::Null, 1 + header)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let mut frames = Vec::with_capacity(count as usize);
        let mut consumed = 1 + header;

        self.depth += 1;
        for _ in 0..count {
            match self.parse_frame(&buf[consumed..])? {
                Some((frame, used)) => {
                    frames.push(frame);
                    consumed += used;
                }
                None => return Ok(None),
            }
        }
        self.depth -= 1;

        Ok(Some((Frame::Array(frames), consumed)))
    }

    /// Parses a whitespace-separated inline command line.
    fn parse_inline(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let (line, consumed) = match take_line(buf) {
            Some(found) => found,
            None => return Ok(None),
        };

        let text =
            std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Err(ParseError::Protocol("empty inline command".to_string()));
        }

        Ok(Some((Frame::command(&words), consumed)))
    }
}

/// Splits one CRLF-terminated line off the front of `buf`.
///
/// Returns the line content (without CRLF) and the total bytes consumed
/// including the terminator, or `None` if no complete line is buffered yet.
#[inline]
fn take_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some((&buf[..i], i + 2));
        }
        i += 1;
    }
    None
}

#[inline]
fn parse_i64(line: &[u8]) -> ParseResult<i64> {
    let text =
        std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    text.parse()
        .map_err(|_| ParseError::InvalidInteger(text.to_string()))
}

/// Decodes a single frame from `buf` with a fresh parser.
pub fn parse_frame(buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
    FrameParser::new().parse(buf)
}
