//! RESP Protocol Implementation
//!
//! A minimal implementation of the Redis Serialization Protocol (RESP2),
//! shared by the blocking store client and the development server.
//!
//! ## Modules
//!
//! - `types`: the [`Frame`] enum and wire serialization
//! - `parser`: incremental decoder for buffered stream data
//!
//! ## Example
//!
//! ```
//! use redmap::protocol::{parse_frame, Frame};
//!
//! // Encoding a command
//! let cmd = Frame::command(&[&b"HGET"[..], b"map", b"field"]);
//! let wire = cmd.encode();
//!
//! // Decoding it again
//! let (frame, consumed) = parse_frame(&wire).unwrap().unwrap();
//! assert_eq!(frame, cmd);
//! assert_eq!(consumed, wire.len());
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_frame, FrameParser, ParseError, ParseResult};
pub use types::Frame;
