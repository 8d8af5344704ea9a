//! In-Process Store Engine
//!
//! `MemoryStore` is the embedded backend: a thread-safe engine holding
//! hash objects (the shared map contents) and lists (the reference-count
//! protocol). It backs single-process use, the test suite, and the
//! development server.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MemoryStore                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ hashes  │ │ hashes  │ │ hashes  │ │ hashes  │           │
//! │  │ lists   │ │ lists   │ │ lists   │ │ lists   │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Object names are distributed across shards by hash, so operations on
//! unrelated objects rarely contend. Hash objects and lists live in
//! separate tables for type safety. A hash or list object is dropped from
//! its table the moment it becomes empty: absent and empty are the same
//! observable state, which is what the eviction protocol relies on.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Number of shards for the engine.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// A single shard containing a portion of the keyspace.
#[derive(Debug, Default)]
struct Shard {
    /// Hash objects: object name -> field -> value
    hashes: RwLock<HashMap<Bytes, HashMap<Bytes, Bytes>>>,
    /// List objects: object name -> tokens, head at the front
    lists: RwLock<HashMap<Bytes, VecDeque<Bytes>>>,
}

/// The in-process store engine.
///
/// Designed to be wrapped in an `Arc` and shared across map handles and
/// server connection tasks alike. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use redmap::store::MemoryStore;
/// use bytes::Bytes;
///
/// let store = MemoryStore::new();
///
/// store.hset(Bytes::from("m1"), Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(
///     store.hget(&Bytes::from("m1"), &Bytes::from("name")),
///     Some(Bytes::from("Ariz"))
/// );
/// ```
pub struct MemoryStore {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: number of live objects (hashes + lists)
    object_count: AtomicU64,

    /// Statistics: total hash operations
    hash_op_count: AtomicU64,

    /// Statistics: total list operations
    list_op_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("objects", &self.object_count.load(Ordering::Relaxed))
            .field("hash_ops", &self.hash_op_count.load(Ordering::Relaxed))
            .field("list_ops", &self.list_op_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a new engine with default settings.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            object_count: AtomicU64::new(0),
            hash_op_count: AtomicU64::new(0),
            list_op_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard an object name belongs to.
    #[inline]
    fn shard(&self, name: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Returns the full field-to-value snapshot of a hash object.
    ///
    /// An absent object reads as an empty map.
    pub fn hget_all(&self, name: &Bytes) -> HashMap<Bytes, Bytes> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let hashes = self.shard(name).hashes.read().unwrap();
        hashes.get(name).cloned().unwrap_or_default()
    }

    /// Returns the value of one field, or `None` if absent.
    pub fn hget(&self, name: &Bytes, field: &Bytes) -> Option<Bytes> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let hashes = self.shard(name).hashes.read().unwrap();
        hashes.get(name).and_then(|fields| fields.get(field).cloned())
    }

    /// Upserts a single field.
    ///
    /// # Returns
    ///
    /// Returns `true` if the field was created, `false` if it was updated.
    pub fn hset(&self, name: Bytes, field: Bytes, value: Bytes) -> bool {
        self.hset_many(name, vec![(field, value)]) == 1
    }

    /// Upserts multiple fields under one shard lock.
    ///
    /// The whole batch becomes visible atomically to readers of this
    /// engine, mirroring a multi-field HSET round trip.
    ///
    /// # Returns
    ///
    /// Returns the number of fields that were newly created.
    pub fn hset_many(&self, name: Bytes, entries: Vec<(Bytes, Bytes)>) -> usize {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);
        if entries.is_empty() {
            return 0;
        }

        let mut hashes = self.shard(&name).hashes.write().unwrap();
        let is_new_object = !hashes.contains_key(&name);
        let fields = hashes.entry(name).or_default();

        let mut created = 0;
        for (field, value) in entries {
            if fields.insert(field, value).is_none() {
                created += 1;
            }
        }

        if is_new_object {
            self.object_count.fetch_add(1, Ordering::Relaxed);
        }
        created
    }

    /// Removes a field if present. The hash object itself is dropped once
    /// its last field goes.
    ///
    /// # Returns
    ///
    /// Returns `true` if the field existed.
    pub fn hdel(&self, name: &Bytes, field: &Bytes) -> bool {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let mut hashes = self.shard(name).hashes.write().unwrap();
        let Some(fields) = hashes.get_mut(name) else {
            return false;
        };

        let existed = fields.remove(field).is_some();
        if fields.is_empty() {
            hashes.remove(name);
            self.object_count.fetch_sub(1, Ordering::Relaxed);
        }
        existed
    }

    /// Returns true if the field exists.
    pub fn hexists(&self, name: &Bytes, field: &Bytes) -> bool {
        let hashes = self.shard(name).hashes.read().unwrap();
        hashes.get(name).is_some_and(|fields| fields.contains_key(field))
    }

    /// Snapshot of the field names of a hash object.
    pub fn hkeys(&self, name: &Bytes) -> Vec<Bytes> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let hashes = self.shard(name).hashes.read().unwrap();
        hashes
            .get(name)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the field values of a hash object.
    pub fn hvals(&self, name: &Bytes) -> Vec<Bytes> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let hashes = self.shard(name).hashes.read().unwrap();
        hashes
            .get(name)
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of fields in a hash object, 0 if absent.
    pub fn hlen(&self, name: &Bytes) -> usize {
        let hashes = self.shard(name).hashes.read().unwrap();
        hashes.get(name).map(|fields| fields.len()).unwrap_or(0)
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Pushes values onto the head of a list, creating it if absent.
    ///
    /// # Returns
    ///
    /// The length of the list after the push.
    pub fn lpush(&self, name: Bytes, values: Vec<Bytes>) -> usize {
        self.list_op_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard(&name);
        let mut lists = shard.lists.write().unwrap();
        let is_new_object = !lists.contains_key(&name);
        let list = lists.entry(name).or_default();

        for value in values {
            list.push_front(value);
        }

        if is_new_object {
            self.object_count.fetch_add(1, Ordering::Relaxed);
        }
        list.len()
    }

    /// Removes and returns the head of a list.
    ///
    /// The list object is dropped once it becomes empty.
    ///
    /// # Returns
    ///
    /// The removed element, or `None` if the list is empty or absent.
    pub fn lpop(&self, name: &Bytes) -> Option<Bytes> {
        self.list_op_count.fetch_add(1, Ordering::Relaxed);

        let mut lists = self.shard(name).lists.write().unwrap();
        let list = lists.get_mut(name)?;
        let value = list.pop_front();

        if list.is_empty() {
            lists.remove(name);
            self.object_count.fetch_sub(1, Ordering::Relaxed);
        }
        value
    }

    /// Returns the length of a list, 0 if absent.
    pub fn llen(&self, name: &Bytes) -> usize {
        let lists = self.shard(name).lists.read().unwrap();
        lists.get(name).map(|list| list.len()).unwrap_or(0)
    }

    // ========================================================================
    // OBJECT AND SERVER OPERATIONS
    // ========================================================================

    /// Deletes a whole object (hash or list) by name.
    ///
    /// # Returns
    ///
    /// Returns `true` if an object was deleted.
    pub fn del(&self, name: &Bytes) -> bool {
        let shard = self.shard(name);

        let removed = {
            let mut hashes = shard.hashes.write().unwrap();
            hashes.remove(name).is_some()
        } || {
            let mut lists = shard.lists.write().unwrap();
            lists.remove(name).is_some()
        };

        if removed {
            self.object_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Returns true if an object (hash or list) exists under this name.
    pub fn exists(&self, name: &Bytes) -> bool {
        let shard = self.shard(name);
        shard.hashes.read().unwrap().contains_key(name)
            || shard.lists.read().unwrap().contains_key(name)
    }

    /// Clears all data. Equivalent to FLUSHALL.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.hashes.write().unwrap().clear();
            shard.lists.write().unwrap().clear();
        }
        self.object_count.store(0, Ordering::Relaxed);
    }

    /// Returns the approximate number of live objects.
    ///
    /// This is an approximation because it uses relaxed atomic ordering.
    pub fn len(&self) -> u64 {
        self.object_count.load(Ordering::Relaxed)
    }

    /// Returns true if the engine holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            objects: self.object_count.load(Ordering::Relaxed),
            hash_ops: self.hash_op_count.load(Ordering::Relaxed),
            list_ops: self.list_op_count.load(Ordering::Relaxed),
        }
    }
}

/// Engine statistics.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Number of live objects (hashes + lists)
    pub objects: u64,
    /// Total hash operations
    pub hash_ops: u64,
    /// Total list operations
    pub list_ops: u64,
}

// ============================================================================
// Store trait implementation
// ============================================================================

use crate::store::{Store, StoreError};
use std::collections::HashSet;

fn text(data: Bytes) -> Result<String, StoreError> {
    String::from_utf8(data.into()).map_err(|e| StoreError::Utf8(e.to_string()))
}

#[inline]
fn raw(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

impl Store for MemoryStore {
    fn hash_get_all(&self, name: &str) -> Result<HashMap<String, String>, StoreError> {
        self.hget_all(&raw(name))
            .into_iter()
            .map(|(field, value)| Ok((text(field)?, text(value)?)))
            .collect()
    }

    fn hash_get(&self, name: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.hget(&raw(name), &raw(field)).map(text).transpose()
    }

    fn hash_set(&self, name: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.hset(raw(name), raw(field), raw(value));
        Ok(())
    }

    fn hash_set_many(
        &self,
        name: &str,
        entries: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let entries = entries
            .iter()
            .map(|(field, value)| (raw(field), raw(value)))
            .collect();
        self.hset_many(raw(name), entries);
        Ok(())
    }

    fn hash_del(&self, name: &str, field: &str) -> Result<(), StoreError> {
        self.hdel(&raw(name), &raw(field));
        Ok(())
    }

    fn hash_keys(&self, name: &str) -> Result<HashSet<String>, StoreError> {
        self.hkeys(&raw(name)).into_iter().map(text).collect()
    }

    fn hash_values(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.hvals(&raw(name)).into_iter().map(text).collect()
    }

    fn list_push(&self, name: &str, token: &str) -> Result<(), StoreError> {
        self.lpush(raw(name), vec![raw(token)]);
        Ok(())
    }

    fn list_pop(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.lpop(&raw(name)).map(text).transpose()
    }

    fn list_len(&self, name: &str) -> Result<u64, StoreError> {
        Ok(self.llen(&raw(name)) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_hset_and_hget() {
        let store = MemoryStore::new();

        assert!(store.hset(b("m"), b("k"), b("v")));
        assert_eq!(store.hget(&b("m"), &b("k")), Some(b("v")));

        // Overwrite reports no new field
        assert!(!store.hset(b("m"), b("k"), b("v2")));
        assert_eq!(store.hget(&b("m"), &b("k")), Some(b("v2")));
    }

    #[test]
    fn test_hget_absent() {
        let store = MemoryStore::new();
        assert_eq!(store.hget(&b("m"), &b("k")), None);
        assert!(store.hget_all(&b("m")).is_empty());
    }

    #[test]
    fn test_hget_all() {
        let store = MemoryStore::new();
        store.hset(b("m"), b("a"), b("1"));
        store.hset(b("m"), b("b"), b("2"));

        let all = store.hget_all(&b("m"));
        assert_eq!(all.len(), 2);
        assert_eq!(all.get(&b("a")), Some(&b("1")));
        assert_eq!(all.get(&b("b")), Some(&b("2")));
    }

    #[test]
    fn test_hset_many() {
        let store = MemoryStore::new();
        store.hset(b("m"), b("a"), b("old"));

        let created = store.hset_many(
            b("m"),
            vec![(b("a"), b("1")), (b("b"), b("2")), (b("c"), b("3"))],
        );
        assert_eq!(created, 2);
        assert_eq!(store.hlen(&b("m")), 3);
        assert_eq!(store.hget(&b("m"), &b("a")), Some(b("1")));
    }

    #[test]
    fn test_hdel_drops_empty_object() {
        let store = MemoryStore::new();
        store.hset(b("m"), b("k"), b("v"));
        assert_eq!(store.len(), 1);

        assert!(store.hdel(&b("m"), &b("k")));
        assert!(!store.hdel(&b("m"), &b("k")));
        assert!(!store.exists(&b("m")));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_hkeys_hvals() {
        let store = MemoryStore::new();
        store.hset(b("m"), b("a"), b("1"));
        store.hset(b("m"), b("b"), b("2"));

        let mut keys = store.hkeys(&b("m"));
        keys.sort();
        assert_eq!(keys, vec![b("a"), b("b")]);

        let mut vals = store.hvals(&b("m"));
        vals.sort();
        assert_eq!(vals, vec![b("1"), b("2")]);
    }

    #[test]
    fn test_hexists() {
        let store = MemoryStore::new();
        assert!(!store.hexists(&b("m"), &b("k")));
        store.hset(b("m"), b("k"), b("v"));
        assert!(store.hexists(&b("m"), &b("k")));
    }

    #[test]
    fn test_lpush_lpop_lifo() {
        let store = MemoryStore::new();

        assert_eq!(store.lpush(b("l"), vec![b("a")]), 1);
        assert_eq!(store.lpush(b("l"), vec![b("b")]), 2);

        // Head push + head pop: most recent token comes back first
        assert_eq!(store.lpop(&b("l")), Some(b("b")));
        assert_eq!(store.lpop(&b("l")), Some(b("a")));
        assert_eq!(store.lpop(&b("l")), None);
    }

    #[test]
    fn test_lpop_drops_empty_object() {
        let store = MemoryStore::new();
        store.lpush(b("l"), vec![b("tok")]);
        assert_eq!(store.len(), 1);

        store.lpop(&b("l"));
        assert!(!store.exists(&b("l")));
        assert_eq!(store.len(), 0);
        assert_eq!(store.llen(&b("l")), 0);
    }

    #[test]
    fn test_llen() {
        let store = MemoryStore::new();
        assert_eq!(store.llen(&b("l")), 0);
        store.lpush(b("l"), vec![b("a"), b("b"), b("c")]);
        assert_eq!(store.llen(&b("l")), 3);
    }

    #[test]
    fn test_del() {
        let store = MemoryStore::new();
        store.hset(b("h"), b("k"), b("v"));
        store.lpush(b("l"), vec![b("tok")]);

        assert!(store.del(&b("h")));
        assert!(store.del(&b("l")));
        assert!(!store.del(&b("h")));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_flush() {
        let store = MemoryStore::new();
        store.hset(b("h"), b("k"), b("v"));
        store.lpush(b("l"), vec![b("tok")]);
        assert_eq!(store.len(), 2);

        store.flush();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        // Writers on distinct hash objects plus a shared one
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let field = Bytes::from(format!("field-{}-{}", i, j));
                    store.hset(Bytes::from(format!("map-{}", i)), field.clone(), Bytes::from("v"));
                    store.hset(Bytes::from("shared"), field.clone(), Bytes::from("v"));
                    store.hget(&Bytes::from("shared"), &field);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.hlen(&Bytes::from("shared")), 1000);
        for i in 0..10 {
            assert_eq!(store.hlen(&Bytes::from(format!("map-{}", i))), 100);
        }
    }

    #[test]
    fn test_store_trait_roundtrip() {
        use crate::store::Store;

        let store = MemoryStore::new();
        store.hash_set("m", "k", "v").unwrap();
        assert_eq!(store.hash_get("m", "k").unwrap(), Some("v".to_string()));
        assert_eq!(store.hash_get("m", "missing").unwrap(), None);

        store.list_push("l", "ok").unwrap();
        assert_eq!(store.list_len("l").unwrap(), 1);
        assert_eq!(store.list_pop("l").unwrap(), Some("ok".to_string()));
        assert_eq!(store.list_pop("l").unwrap(), None);
    }

    #[test]
    fn test_store_trait_rejects_binary_text() {
        use crate::store::Store;

        let store = MemoryStore::new();
        store.hset(b("m"), b("k"), Bytes::from(&b"\xff\xfe"[..]));

        assert!(matches!(
            store.hash_get("m", "k"),
            Err(StoreError::Utf8(_))
        ));
    }
}
