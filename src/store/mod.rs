//! Store Backends
//!
//! This module defines the primitive boundary between the map layer and
//! the shared key-value engine, plus the two backends the crate ships:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SharedMap (map)                         │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │  Store trait
//!              ┌──────────────┴──────────────┐
//!              ▼                             ▼
//!     ┌─────────────────┐          ┌─────────────────────┐
//!     │   MemoryStore   │          │      RespStore      │
//!     │  (in-process,   │          │  (blocking RESP/TCP │
//!     │   sharded)      │          │   client)           │
//!     └─────────────────┘          └──────────┬──────────┘
//!                                             │
//!                                             ▼
//!                                  any Redis-compatible server
//!                                  (e.g. the redmap dev server)
//! ```
//!
//! The trait covers exactly the primitives the map layer needs: hash-field
//! access for the map contents and list access for the reference-count
//! protocol. Absent objects read as empty; popping an empty list and
//! deleting an absent field are silent no-ops.

pub mod memory;
pub mod resp;

// Re-export commonly used types
pub use memory::{MemoryStore, StoreStats};
pub use resp::RespStore;

use crate::protocol::ParseError;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors surfaced by a store backend.
///
/// The map layer propagates these unmodified; it never retries and never
/// attempts compensating writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure (network I/O)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server sent bytes that are not a valid RESP frame
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// The server answered with an error reply
    #[error("server error: {0}")]
    Server(String),

    /// The server answered with a frame of the wrong shape
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// A payload that must be text was not valid UTF-8
    #[error("non-UTF-8 payload: {0}")]
    Utf8(String),
}

/// Primitive operations against the shared engine.
///
/// One store object is shared by every map handle in a process; backends
/// are internally synchronized. Every call blocks until the backend
/// completes or fails.
pub trait Store: Send + Sync {
    /// Full field-to-value snapshot of a hash object; empty if absent.
    fn hash_get_all(&self, name: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Single field of a hash object.
    fn hash_get(&self, name: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Upserts a single field.
    fn hash_set(&self, name: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Upserts multiple fields in one round trip.
    fn hash_set_many(
        &self,
        name: &str,
        entries: &HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Removes a field if present; no-op otherwise.
    fn hash_del(&self, name: &str, field: &str) -> Result<(), StoreError>;

    /// Snapshot of the field names of a hash object.
    fn hash_keys(&self, name: &str) -> Result<HashSet<String>, StoreError>;

    /// Snapshot of the field values of a hash object.
    fn hash_values(&self, name: &str) -> Result<Vec<String>, StoreError>;

    /// Appends a token to a list object.
    fn list_push(&self, name: &str, token: &str) -> Result<(), StoreError>;

    /// Removes and discards one token; no-op if the list is empty.
    fn list_pop(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Current list length, 0 if the list is absent.
    fn list_len(&self, name: &str) -> Result<u64, StoreError>;
}
