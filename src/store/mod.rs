//! Store Module
//!
//! The narrow mapping contract every backing store and every policy layer
//! implements, plus the concrete stores shipped with the crate.

mod file;
mod memory;

use std::vec;

use crate::error::Result;

pub use file::{FileStore, OpenFlag};
pub use memory::MemoryStore;

/// Boxed store used where the concrete backing store is chosen at runtime.
pub type DynStore = Box<dyn Store + Send>;

// == Store Trait ==
/// An ordered mapping from string keys to opaque byte values.
///
/// Policy layers implement this same trait over an inner `Store`, so a
/// layer can wrap either a bare store or another layer.
pub trait Store {
    /// Returns the value stored under `key`, or `NotFound`.
    fn get(&mut self, key: &str) -> Result<Vec<u8>>;

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Removes `key`, or fails with `NotFound`.
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Takes `&mut self` because layers may purge an expired key while answering.
    fn contains(&mut self, key: &str) -> Result<bool>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in the store's native iteration order at the time of the call.
    fn key_snapshot(&self) -> Vec<String>;

    /// Flushes pending state to the durable medium.
    fn sync(&mut self) -> Result<()>;

    /// Flushes and releases the store. Calling it twice is harmless.
    fn close(&mut self) -> Result<()>;

    /// Asks the store to record the keys it removes on its own initiative
    /// for `take_purged`. A layer calls this on the store it wraps; a store
    /// nothing wraps records nothing.
    fn track_removals(&mut self) {}

    /// Drains the keys this store removed on its own initiative (expiry
    /// purges, evictions) since the previous call. Empty unless
    /// `track_removals` was called.
    fn take_purged(&mut self) -> Vec<String> {
        Vec::new()
    }

    /// Lazy iterator over live keys.
    fn keys(&mut self) -> Keys<'_, Self>
    where
        Self: Sized,
    {
        Keys::new(self)
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn contains(&mut self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn key_snapshot(&self) -> Vec<String> {
        (**self).key_snapshot()
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn track_removals(&mut self) {
        (**self).track_removals()
    }

    fn take_purged(&mut self) -> Vec<String> {
        (**self).take_purged()
    }
}

// == Keys Iterator ==
/// One-shot iterator over the live keys of a store.
///
/// Walks a snapshot of the key list and re-checks each key with
/// `contains` before yielding it, so keys removed mid-scan are skipped and
/// a layer's `contains` can hide or purge entries as they are reached.
pub struct Keys<'a, S: Store + ?Sized> {
    store: &'a mut S,
    pending: vec::IntoIter<String>,
}

impl<'a, S: Store + ?Sized> Keys<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        let pending = store.key_snapshot().into_iter();
        Self { store, pending }
    }
}

impl<S: Store + ?Sized> Iterator for Keys<'_, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.pending.by_ref() {
            match self.store.contains(&key) {
                Ok(true) => return Some(Ok(key)),
                Ok(false) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_skip_entries_removed_mid_scan() {
        let mut store = MemoryStore::new();
        store.set("a", b"1".to_vec()).unwrap();
        store.set("b", b"2".to_vec()).unwrap();
        store.set("c", b"3".to_vec()).unwrap();

        let mut keys = store.keys();
        assert_eq!(keys.next().unwrap().unwrap(), "a");
        keys.store.delete("b").unwrap();
        assert_eq!(keys.next().unwrap().unwrap(), "c");
        assert!(keys.next().is_none());
    }

    #[test]
    fn test_boxed_store_forwards() {
        let mut store: DynStore = Box::new(MemoryStore::new());
        store.set("k", b"v".to_vec()).unwrap();

        assert_eq!(store.get("k").unwrap(), b"v".to_vec());
        assert_eq!(store.len(), 1);
        let keys: Vec<String> = store.keys().collect::<Result<_>>().unwrap();
        assert_eq!(keys, vec!["k".to_string()]);
    }
}
