//! Map surface and lifecycle tests against the embedded store.
//!
//! Every scenario here drives `SharedMap` through the `Store` trait with a
//! `MemoryStore` behind it; the wire path gets the same scenarios in
//! `tests/server.rs`.

use proptest::prelude::*;
use redmap::store::{MemoryStore, Store};
use redmap::{MapError, SharedMap};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn fresh_store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

#[test]
fn base_map_operations() {
    let store = fresh_store();
    let map1 = SharedMap::open(Arc::clone(&store)).unwrap();
    let map2 = SharedMap::open(Arc::clone(&store)).unwrap();

    map1.insert("one", "1").unwrap();
    map2.insert("one", "ONE").unwrap();
    map2.insert("two", "TWO").unwrap();

    assert_eq!(map1.get("one").unwrap(), Some("1".to_string()));
    assert_eq!(map1.len().unwrap(), 1);
    assert_eq!(map2.len().unwrap(), 2);

    map1.insert("one", "first").unwrap();
    assert_eq!(map1.get("one").unwrap(), Some("first".to_string()));
    assert_eq!(map1.len().unwrap(), 1);

    assert!(map1.contains_key("one").unwrap());
    assert!(!map1.contains_key("two").unwrap());

    let keys2 = map2.keys().unwrap();
    assert_eq!(keys2.len(), 2);
    assert!(keys2.contains("one"));
    assert!(keys2.contains("two"));

    let values1 = map1.values().unwrap();
    assert_eq!(values1, vec!["first".to_string()]);

    map1.clear().unwrap();
    let bulk = HashMap::from([
        ("1".to_string(), "a".to_string()),
        ("2".to_string(), "b".to_string()),
    ]);
    map1.insert_many(&bulk).unwrap();
    assert_eq!(map1.get("1").unwrap(), Some("a".to_string()));
    assert_eq!(map1.get("2").unwrap(), Some("b".to_string()));
    assert_eq!(map1.len().unwrap(), 2);
}

#[test]
fn previous_values_and_entry_snapshots() {
    let store = fresh_store();
    let map = SharedMap::open(Arc::clone(&store)).unwrap();

    let mut expected = HashMap::new();
    for key in ["a", "b", "c", "d"] {
        expected.insert(key.to_string(), key.to_string());
    }
    map.insert_many(&expected).unwrap();

    for (key, value) in map.entries().unwrap() {
        assert_eq!(expected.get(&key), Some(&value));
    }

    assert_eq!(map.remove("a").unwrap(), Some("a".to_string()));
    assert_eq!(map.remove("missing").unwrap(), None);

    assert_eq!(map.insert("a", "a").unwrap(), None);
    assert_eq!(map.insert("a", "b").unwrap(), Some("a".to_string()));
    assert!(!map.is_empty().unwrap());
}

#[test]
fn equality_follows_identifier_then_contents() {
    let store = fresh_store();
    let map1 = SharedMap::open(Arc::clone(&store)).unwrap();
    let map2 = SharedMap::open(Arc::clone(&store)).unwrap();
    let map3 = SharedMap::attach(Arc::clone(&store), map1.id()).unwrap();

    map1.insert("1", "2").unwrap();
    map2.insert("1", "2").unwrap();

    // Reflexive, and symmetric through both comparison paths
    assert_eq!(map1, map1);
    assert_eq!(map1, map2);
    assert_eq!(map2, map1);
    assert_eq!(map2, map3);
    assert_eq!(map3, map1);

    // Diverging contents break contents-equality but not id-equality
    map1.remove("1").unwrap();
    assert_ne!(map1, map2);
    assert_eq!(map1, map3);
}

#[test]
fn empty_identifier_is_rejected_before_any_store_call() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let result = SharedMap::attach(Arc::clone(&store) as Arc<dyn Store>, "");

    assert!(matches!(result, Err(MapError::InvalidIdentifier)));
    assert!(store.is_empty());
}

#[test]
fn writes_through_one_handle_are_visible_through_another() {
    let store = fresh_store();
    let map = SharedMap::attach(Arc::clone(&store), "shared-visibility").unwrap();
    let twin = SharedMap::attach(Arc::clone(&store), "shared-visibility").unwrap();

    map.insert("1", "2").unwrap();
    assert_eq!(twin.get("1").unwrap(), Some("2".to_string()));
    assert_eq!(map, twin);

    twin.clear().unwrap();
    assert!(map.is_empty().unwrap());
    assert!(twin.is_empty().unwrap());
    assert_eq!(map.len().unwrap(), 0);
}

#[test]
fn dropping_the_last_handle_evicts_the_contents() {
    let store = fresh_store();

    {
        let map = SharedMap::attach(Arc::clone(&store), "evict-on-drop").unwrap();
        map.insert("1", "2").unwrap();
    }

    let reopened = SharedMap::attach(Arc::clone(&store), "evict-on-drop").unwrap();
    assert_eq!(reopened.len().unwrap(), 0);
}

#[test]
fn surviving_handles_keep_the_contents_alive() {
    let store = fresh_store();
    let keeper = SharedMap::attach(Arc::clone(&store), "keeper").unwrap();
    let unrelated = SharedMap::open(Arc::clone(&store)).unwrap();

    {
        let first = SharedMap::attach(Arc::clone(&store), "keeper").unwrap();
        first.insert("1", "2").unwrap();
    }

    // One reference remains, so the contents must survive the drop above
    assert_eq!(keeper.len().unwrap(), 1);
    assert_eq!(keeper.get("1").unwrap(), Some("2".to_string()));
    assert_eq!(unrelated.len().unwrap(), 0);

    keeper.release().unwrap();
    let reopened = SharedMap::attach(Arc::clone(&store), "keeper").unwrap();
    assert_eq!(reopened.len().unwrap(), 0);
}

#[test]
fn open_release_churn_leaves_contents_untouched() {
    let store = fresh_store();
    let keeper = SharedMap::attach(Arc::clone(&store), "churn").unwrap();
    keeper.insert("stable", "value").unwrap();

    let mut workers = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        workers.push(thread::spawn(move || {
            for _ in 0..50 {
                let handle = SharedMap::attach(Arc::clone(&store), "churn").unwrap();
                handle.release().unwrap();
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    // Net-zero churn: only explicit mutations may change the contents
    assert_eq!(keeper.len().unwrap(), 1);
    assert_eq!(keeper.get("stable").unwrap(), Some("value".to_string()));
}

#[test]
fn concurrent_distinct_inserts_all_land() {
    const THREADS: usize = 6;
    const PER_THREAD: usize = 2000;

    let store = fresh_store();
    let map = Arc::new(SharedMap::attach(Arc::clone(&store), "stress").unwrap());
    let counter = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::new();
    for _ in 0..THREADS {
        let map = Arc::clone(&map);
        let counter = Arc::clone(&counter);
        workers.push(thread::spawn(move || {
            for _ in 0..PER_THREAD {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                map.insert(&n.to_string(), "test").unwrap();
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(map.len().unwrap(), THREADS * PER_THREAD);

    // Symmetric concurrent removal drains the map completely
    let counter = Arc::new(AtomicUsize::new(0));
    let mut workers = Vec::new();
    for _ in 0..THREADS {
        let map = Arc::clone(&map);
        let counter = Arc::clone(&counter);
        workers.push(thread::spawn(move || {
            for _ in 0..PER_THREAD {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                map.remove(&n.to_string()).unwrap();
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(map.len().unwrap(), 0);
}

#[test]
fn concurrent_bulk_inserts_on_disjoint_keys() {
    let store = fresh_store();
    let map = Arc::new(SharedMap::attach(Arc::clone(&store), "bulk").unwrap());

    let mut workers = Vec::new();
    for t in 0..4 {
        let map = Arc::clone(&map);
        workers.push(thread::spawn(move || {
            let batch: HashMap<String, String> = (0..100)
                .map(|i| (format!("{}:{}", t, i), "v".to_string()))
                .collect();
            map.insert_many(&batch).unwrap();
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(map.len().unwrap(), 400);
}

// ============================================================================
// Model-based property test
// ============================================================================

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, String),
    Remove(usize),
    Get(usize),
    ContainsKey(usize),
    InsertMany(Vec<(usize, String)>),
    Clear,
    Len,
}

const KEY_POOL: [&str; 5] = ["alpha", "beta", "gamma", "delta", "epsilon"];

fn arb_op() -> impl Strategy<Value = Op> {
    let key = 0..KEY_POOL.len();
    let value = "[a-z]{0,4}";
    prop_oneof![
        (key.clone(), value.clone()).prop_map(|(k, v)| Op::Insert(k, v)),
        key.clone().prop_map(Op::Remove),
        key.clone().prop_map(Op::Get),
        key.clone().prop_map(Op::ContainsKey),
        proptest::collection::vec((key, value), 0..4).prop_map(Op::InsertMany),
        Just(Op::Clear),
        Just(Op::Len),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    // State-machine equivalence against std::collections::HashMap: every
    // operation must agree with the model on its return value, and len
    // parity must hold after each step.
    #[test]
    fn prop_map_matches_hashmap_model(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let map = SharedMap::open(fresh_store()).unwrap();
        let mut model: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let key = KEY_POOL[k];
                    let previous = map.insert(key, &v).unwrap();
                    prop_assert_eq!(previous, model.insert(key.to_string(), v));
                }
                Op::Remove(k) => {
                    let key = KEY_POOL[k];
                    prop_assert_eq!(map.remove(key).unwrap(), model.remove(key));
                }
                Op::Get(k) => {
                    let key = KEY_POOL[k];
                    prop_assert_eq!(map.get(key).unwrap(), model.get(key).cloned());
                }
                Op::ContainsKey(k) => {
                    let key = KEY_POOL[k];
                    prop_assert_eq!(map.contains_key(key).unwrap(), model.contains_key(key));
                }
                Op::InsertMany(batch) => {
                    let batch: HashMap<String, String> = batch
                        .into_iter()
                        .map(|(k, v)| (KEY_POOL[k].to_string(), v))
                        .collect();
                    map.insert_many(&batch).unwrap();
                    model.extend(batch);
                }
                Op::Clear => {
                    map.clear().unwrap();
                    model.clear();
                }
                Op::Len => {}
            }

            prop_assert_eq!(map.len().unwrap(), model.len());
        }

        prop_assert_eq!(map.entries().unwrap(), model);
    }
}
