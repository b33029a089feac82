//! In-memory store backed by a BTreeMap.

use std::collections::BTreeMap;

use crate::error::{CacheError, Result};
use crate::store::Store;

/// A volatile store; iteration order is lexicographic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw record lookup, bypassing any layer. Used to inspect what a layer
    /// actually persisted.
    pub fn raw(&self, key: &str) -> Option<&[u8]> {
        self.records.get(key).map(Vec::as_slice)
    }
}

impl Store for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        self.records
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.records.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.records
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn contains(&mut self, key: &str) -> Result<bool> {
        Ok(self.records.contains_key(key))
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn key_snapshot(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
