//! Shared Map Handles
//!
//! A [`SharedMap`] behaves like a local string-to-string map, but its
//! contents live in a shared store as a hash object named by the map's
//! identifier. Any number of handles, in this process or others, may
//! attach to the same identifier and observe each other's writes.
//!
//! ```text
//!  process A                 process B
//! ┌────────────┐            ┌────────────┐
//! │ SharedMap  │            │ SharedMap  │
//! │ (id = U)   │            │ (id = U)   │
//! └─────┬──────┘            └─────┬──────┘
//!       │         Store           │
//!       ▼                         ▼
//! ┌─────────────────────────────────────┐
//! │   hash object  U     {k: v, ...}    │
//! │   list object  lock#U   [ok, ok]    │
//! └─────────────────────────────────────┘
//! ```
//!
//! The list object carries the distributed reference count: one token per
//! live handle. The last handle to release pops the final token and
//! clears the hash, so maps evict themselves once nobody references them.
//! Release happens exactly once per handle, either through the consuming
//! [`SharedMap::release`] or deterministically in `Drop`.
//!
//! ## Example
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
//! // A second handle on the same identifier sees the write
//! let twin = SharedMap::attach(Arc::clone(&store), map.id()).unwrap();
//! assert_eq!(twin.get("one").unwrap(), Some("1".to_string()));
//!
//! twin.release().unwrap();
//! map.release().unwrap();
//! ```

pub(crate) mod guard;
pub(crate) mod lifecycle;

use crate::map::guard::{guard_for, Guard};
use crate::map::lifecycle::RefList;
use crate::store::{Store, StoreError};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Length of generated map identifiers.
const IDENTIFIER_LEN: usize = 32;

/// Errors surfaced by map handles.
#[derive(Debug, Error)]
pub enum MapError {
    /// The identifier is empty. An empty name would alias the `""` hash
    /// object and its reference list across unrelated callers.
    #[error("invalid identifier: must be a non-empty string")]
    InvalidIdentifier,

    /// A store backend failure, propagated unmodified
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A handle onto a shared, reference-counted map.
///
/// Cheap to open: a handle is an identifier, a store reference, and one
/// pushed token. Reading and writing go straight to the store; nothing is
/// cached locally, so every handle always observes the current contents.
///
/// Dropping the handle releases its reference. Use [`SharedMap::release`]
/// instead when the store error, if any, matters.
pub struct SharedMap {
    store: Arc<dyn Store>,
    id: String,
    guard: Guard,
    refs: RefList,
    released: bool,
}

impl SharedMap {
    /// Opens a map under a fresh random identifier.
    pub fn open(store: Arc<dyn Store>) -> Result<Self, MapError> {
        Self::attach(store, random_identifier())
    }

    /// Attaches to the map named by `identifier`, creating it on first
    /// use. Each call adds one reference: attaching twice yields two
    /// handles and two tokens.
    pub fn attach(store: Arc<dyn Store>, identifier: impl Into<String>) -> Result<Self, MapError> {
        let id = identifier.into();
        if id.is_empty() {
            return Err(MapError::InvalidIdentifier);
        }

        let guard = guard_for(&id);
        let refs = RefList::new(Arc::clone(&store), &id, Arc::clone(&guard));
        refs.acquire()?;
        debug!(identifier = %id, "handle opened");

        Ok(Self {
            store,
            id,
            guard,
            refs,
            released: false,
        })
    }

    /// The identifier of this map, for sharing with other processes.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of entries currently in the map.
    ///
    /// Costs a full snapshot fetch, the store's native operation shape.
    pub fn len(&self) -> Result<usize, MapError> {
        let _shared = self.guard.read().unwrap();
        Ok(self.store.hash_get_all(&self.id)?.len())
    }

    /// Returns true if the map holds no entries.
    pub fn is_empty(&self) -> Result<bool, MapError> {
        Ok(self.len()? == 0)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> Result<bool, MapError> {
        let _shared = self.guard.read().unwrap();
        Ok(self.store.hash_get(&self.id, key)?.is_some())
    }

    /// Returns true if any entry currently holds `value`. Full scan.
    pub fn contains_value(&self, value: &str) -> Result<bool, MapError> {
        let _shared = self.guard.read().unwrap();
        Ok(self
            .store
            .hash_get_all(&self.id)?
            .values()
            .any(|candidate| candidate == value))
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<String>, MapError> {
        let _shared = self.guard.read().unwrap();
        Ok(self.store.hash_get(&self.id, key)?)
    }

    /// Upserts `key` and returns the value it replaced.
    ///
    /// The prior-value read and the write are one exclusive section
    /// locally, but not atomic across processes: a concurrent remote
    /// writer can make the returned value stale. The stored value is
    /// still last-writer-wins.
    pub fn insert(&self, key: &str, value: &str) -> Result<Option<String>, MapError> {
        let _exclusive = self.guard.write().unwrap();
        let previous = self.store.hash_get(&self.id, key)?;
        self.store.hash_set(&self.id, key, value)?;
        Ok(previous)
    }

    /// Removes `key` and returns the value it held.
    pub fn remove(&self, key: &str) -> Result<Option<String>, MapError> {
        let _exclusive = self.guard.write().unwrap();
        let previous = self.store.hash_get(&self.id, key)?;
        if previous.is_some() {
            self.store.hash_del(&self.id, key)?;
        }
        Ok(previous)
    }

    /// Upserts every entry in one exclusive section, using the store's
    /// multi-field primitive as a single round trip.
    pub fn insert_many(&self, entries: &HashMap<String, String>) -> Result<(), MapError> {
        let _exclusive = self.guard.write().unwrap();
        self.store.hash_set_many(&self.id, entries)?;
        Ok(())
    }

    /// Removes every entry.
    ///
    /// Deletes the known fields one by one; entries added concurrently by
    /// another process mid-clear may survive.
    pub fn clear(&self) -> Result<(), MapError> {
        let _exclusive = self.guard.write().unwrap();
        self.clear_locked()?;
        Ok(())
    }

    /// Snapshot of the keys. A point-in-time copy, not a live view.
    pub fn keys(&self) -> Result<HashSet<String>, MapError> {
        let _shared = self.guard.read().unwrap();
        Ok(self.store.hash_keys(&self.id)?)
    }

    /// Snapshot of the values. A point-in-time copy, not a live view.
    pub fn values(&self) -> Result<Vec<String>, MapError> {
        let _shared = self.guard.read().unwrap();
        Ok(self.store.hash_values(&self.id)?)
    }

    /// Snapshot of the entries. A point-in-time copy, not a live view.
    pub fn entries(&self) -> Result<HashMap<String, String>, MapError> {
        let _shared = self.guard.read().unwrap();
        Ok(self.store.hash_get_all(&self.id)?)
    }

    /// Releases this handle's reference explicitly, surfacing any store
    /// error. The last released handle clears the map contents.
    ///
    /// Consuming the handle makes use-after-release unrepresentable;
    /// handles that merely go out of scope release in `Drop` instead.
    pub fn release(mut self) -> Result<(), MapError> {
        self.release_once().map_err(MapError::Store)
    }

    /// The single release path shared by `release` and `Drop`.
    fn release_once(&mut self) -> Result<(), StoreError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if self.refs.release()? {
            debug!(identifier = %self.id, "last reference gone, clearing map");
            let _exclusive = self.guard.write().unwrap();
            self.clear_locked()?;
        }
        Ok(())
    }

    /// Deletes every field. Caller holds the exclusive section.
    fn clear_locked(&self) -> Result<(), StoreError> {
        for key in self.store.hash_keys(&self.id)? {
            self.store.hash_del(&self.id, &key)?;
        }
        Ok(())
    }
}

impl Drop for SharedMap {
    fn drop(&mut self) {
        if let Err(e) = self.release_once() {
            warn!(identifier = %self.id, error = %e, "releasing handle failed during drop");
        }
    }
}

impl std::fmt::Debug for SharedMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMap")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

/// Two handles are equal if they name the same map, or if their current
/// entry snapshots match. Handles on different identifiers with identical
/// contents therefore compare equal; a snapshot fetch failure compares
/// unequal.
impl PartialEq for SharedMap {
    fn eq(&self, other: &Self) -> bool {
        if self.id == other.id {
            return true;
        }
        match (self.entries(), other.entries()) {
            (Ok(mine), Ok(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

/// Generates a fresh random map identifier.
fn random_identifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(IDENTIFIER_LEN)
        .map(char::from)
        .collect()
}
