//! # redmap - A Distributed, Reference-Counted Shared Map
//!
//! redmap lets any number of processes treat one hash object in a shared
//! Redis-compatible store as if it were a local `HashMap<String, String>`.
//! Handles attach to a map by identifier, observe each other's writes,
//! and cooperatively evict the map once the last handle anywhere releases
//! its reference.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              redmap                                 │
//! │                                                                     │
//! │  ┌─────────────┐     ┌──────────────┐     ┌───────────────────┐     │
//! │  │  SharedMap  │────>│  per-id      │────>│  RefList          │     │
//! │  │  (handle)   │     │  guard       │     │  (lifecycle)      │     │
//! │  └──────┬──────┘     └──────────────┘     └─────────┬─────────┘     │
//! │         │                                           │               │
//! │         └──────────────────┬────────────────────────┘               │
//! │                            ▼                                        │
//! │                      Store trait                                    │
//! │              ┌─────────────┴─────────────┐                          │
//! │              ▼                           ▼                          │
//! │     ┌─────────────────┐         ┌─────────────────┐                 │
//! │     │   MemoryStore   │         │    RespStore    │                 │
//! │     │  (in-process)   │         │  (RESP over TCP)│                 │
//! │     └────────┬────────┘         └─────────────────┘                 │
//! │              ▲                                                      │
//! │              │                                                      │
//! │     ┌────────┴────────┐                                             │
//! │     │   dev server    │  (redmap-server binary)                     │
//! │     └─────────────────┘                                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The lifecycle protocol
//!
//! Next to each hash object `U` lives a list object `lock#U` holding one
//! token per live handle, across all processes. Attaching pushes a token;
//! releasing pops one and reads the remaining length. Whichever handle
//! observes the length reach zero deletes every field of `U`. The count
//! lives in the store itself, so no coordination service is needed and no
//! explicit close call is mandatory: `Drop` releases too.
//!
//! ## Quick Start
//!
//! ```
//! use redmap::store::{MemoryStore, Store};
//! use redmap::SharedMap;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//!
//! let map = SharedMap::open(Arc::clone(&store)).unwrap();
//! map.insert("one", "1").unwrap();
//!
//! let twin = SharedMap::attach(Arc::clone(&store), map.id()).unwrap();
//! assert_eq!(twin.get("one").unwrap(), Some("1".to_string()));
//! assert_eq!(twin.len().unwrap(), 1);
//!
//! twin.release().unwrap();
//! map.release().unwrap();
//! ```
//!
//! Against a live server, replace the store with
//! `RespStore::connect("127.0.0.1:6379")`; the map surface is identical.
//!
//! ## Module Overview
//!
//! - [`map`]: the `SharedMap` handle, per-identifier guard, lifecycle
//! - [`store`]: the `Store` trait and the two backends
//! - [`protocol`]: RESP frame types and incremental parser
//! - [`server`]: the development server
//!
//! ## Concurrency Model
//!
//! Within one process, operations on one identifier are serialized by a
//! shared reader/writer lock: readers run together, writers exclude
//! everyone. Across processes only per-primitive atomicity holds, so
//! compound results (`insert`'s returned prior value) can be stale under
//! remote contention while stored values stay last-writer-wins.

pub mod map;
pub mod protocol;
pub mod server;
pub mod store;

// Re-export the user-facing surface
pub use map::{MapError, SharedMap};
pub use store::{MemoryStore, RespStore, Store, StoreError};

/// The default port the development server listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host the development server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of redmap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
