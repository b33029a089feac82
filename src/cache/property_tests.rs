//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the layer invariants over arbitrary operation
//! sequences.

use proptest::prelude::*;
use std::collections::BTreeSet;

use crate::cache::{CacheHandle, INDEX_KEY};
use crate::config::Limit;
use crate::error::{CacheError, Result};
use crate::store::{MemoryStore, Store};

// == Test Configuration ==
const TEST_TIMEOUT: u64 = 300;

// == Strategies ==
/// Short keys so sequences revisit the same key often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}".prop_map(|s| s)
}

fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Contains { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
        key_strategy().prop_map(|key| CacheOp::Contains { key }),
    ]
}

fn apply(cache: &mut CacheHandle<MemoryStore>, op: CacheOp) {
    match op {
        CacheOp::Set { key, value } => cache.set(&key, &value).unwrap(),
        CacheOp::Get { key } => match cache.get::<String>(&key) {
            Ok(_) | Err(CacheError::NotFound(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        },
        CacheOp::Delete { key } => match cache.delete(&key) {
            Ok(()) | Err(CacheError::NotFound(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        },
        CacheOp::Contains { key } => {
            cache.contains(&key).unwrap();
        }
    }
}

fn live_keys(cache: &mut CacheHandle<MemoryStore>) -> Vec<String> {
    cache.keys().unwrap().collect::<Result<_>>().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // The reserved index record never shows through keys, len or contains.
    #[test]
    fn prop_index_key_hidden(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut cache = CacheHandle::new(
            MemoryStore::new(),
            Limit::Bound(4),
            Limit::Bound(TEST_TIMEOUT),
        ).unwrap();

        for op in ops {
            apply(&mut cache, op);
            prop_assert!(!cache.contains(INDEX_KEY).unwrap());
        }

        let keys = live_keys(&mut cache);
        prop_assert!(!keys.iter().any(|k| k == INDEX_KEY));
        prop_assert_eq!(keys.len(), cache.len());
    }

    // The recency queue always holds exactly the store's live keys.
    #[test]
    fn prop_queue_matches_store(
        ops in prop::collection::vec(cache_op_strategy(), 1..60),
        maxsize in 0usize..6,
    ) {
        let mut cache = CacheHandle::new(
            MemoryStore::new(),
            Limit::Bound(maxsize as u64),
            Limit::Bound(TEST_TIMEOUT),
        ).unwrap();

        for op in ops {
            apply(&mut cache, op);
            let queued: BTreeSet<String> = cache.recency().unwrap().into_iter().collect();
            let stored: BTreeSet<String> = live_keys(&mut cache).into_iter().collect();
            prop_assert_eq!(queued, stored);
        }
    }

    // The number of keys never exceeds a nonzero bound.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), value_strategy()), 1..100),
    ) {
        let maxsize = 10;
        let mut cache = CacheHandle::new(
            MemoryStore::new(),
            Limit::Bound(maxsize),
            Limit::Disabled,
        ).unwrap();

        for (key, value) in entries {
            cache.set(&key, &value).unwrap();
            prop_assert!(cache.len() <= maxsize as usize);
        }
    }

    // Set then get before expiry returns the exact value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in value_strategy()) {
        let mut cache = CacheHandle::new(
            MemoryStore::new(),
            Limit::Bound(0),
            Limit::Bound(TEST_TIMEOUT),
        ).unwrap();

        cache.set(&key, &value).unwrap();
        prop_assert_eq!(cache.get::<String>(&key).unwrap(), value);
    }

    // A second set replaces the first and keeps a single entry.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy(),
    ) {
        let mut cache = CacheHandle::new(
            MemoryStore::new(),
            Limit::Bound(3),
            Limit::Bound(TEST_TIMEOUT),
        ).unwrap();

        cache.set(&key, &value1).unwrap();
        cache.set(&key, &value2).unwrap();

        prop_assert_eq!(cache.get::<String>(&key).unwrap(), value2);
        prop_assert_eq!(cache.len(), 1);
        prop_assert_eq!(cache.recency().unwrap(), vec![key]);
    }

    // After filling to capacity, a new key evicts the first inserted one,
    // unless it was read in between.
    #[test]
    fn prop_lru_eviction_order(
        initial_keys in prop::collection::btree_set(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy(),
        reread_first in any::<bool>(),
    ) {
        prop_assume!(!initial_keys.contains(&new_key));
        let keys: Vec<String> = initial_keys.into_iter().collect();

        let mut cache = CacheHandle::new(
            MemoryStore::new(),
            Limit::Bound(keys.len() as u64),
            Limit::Disabled,
        ).unwrap();
        for key in &keys {
            cache.set(key, &format!("value_{}", key)).unwrap();
        }
        if reread_first {
            cache.get::<String>(&keys[0]).unwrap();
        }

        cache.set(&new_key, "new").unwrap();

        let expected_evicted = if reread_first { &keys[1] } else { &keys[0] };
        prop_assert!(!cache.contains(expected_evicted).unwrap());
        prop_assert!(cache.contains(&new_key).unwrap());
        prop_assert_eq!(cache.len(), keys.len());
    }

    // Dropping the layers and rewrapping the store exposes the same keys.
    #[test]
    fn prop_reopen_preserves_live_keys(ops in prop::collection::vec(cache_op_strategy(), 1..40)) {
        let mut cache = CacheHandle::new(
            MemoryStore::new(),
            Limit::Bound(5),
            Limit::Bound(TEST_TIMEOUT),
        ).unwrap();
        for op in ops {
            apply(&mut cache, op);
        }
        let before: BTreeSet<String> = live_keys(&mut cache).into_iter().collect();

        let store = cache.into_store().unwrap();
        prop_assert!(store.key_snapshot().iter().any(|k| k == INDEX_KEY));

        let mut cache = CacheHandle::new(store, Limit::Bound(5), Limit::Bound(TEST_TIMEOUT)).unwrap();
        let after: BTreeSet<String> = live_keys(&mut cache).into_iter().collect();
        prop_assert_eq!(before, after);
    }
}
