//! Expiry Index Module
//!
//! Maps every live key to an absolute deadline (or none) and serializes
//! itself into a single store record.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

// == Expiry Index ==
/// Deadlines per key in Unix milliseconds; `None` means the key never expires.
///
/// Backed by a `BTreeMap` so the encoded record is byte-for-byte stable
/// across repeated syncs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpiryIndex {
    deadlines: BTreeMap<String, Option<u64>>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // == Stamp ==
    /// Records the deadline for `key` as `now_ms + ttl` seconds.
    ///
    /// A `ttl` of zero marks the key as permanent.
    pub fn stamp(&mut self, key: &str, ttl_seconds: u64, now_ms: u64) {
        let deadline = (ttl_seconds > 0)
            .then(|| now_ms.saturating_add(ttl_seconds.saturating_mul(1000)));
        self.deadlines.insert(key.to_string(), deadline);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.deadlines.remove(key).is_some()
    }

    /// Returns `None` if the key is not indexed, `Some(None)` if it never expires.
    pub fn deadline(&self, key: &str) -> Option<Option<u64>> {
        self.deadlines.get(key).copied()
    }

    // == Is Expired ==
    /// A key is expired once `now_ms` reaches its deadline.
    ///
    /// Unindexed and permanent keys are never expired.
    pub fn is_expired(&self, key: &str, now_ms: u64) -> bool {
        matches!(self.deadlines.get(key), Some(Some(deadline)) if *deadline <= now_ms)
    }

    /// Remaining lifetime in milliseconds, `Some(0)` once expired, `None`
    /// for permanent or unindexed keys.
    pub fn ttl_remaining_ms(&self, key: &str, now_ms: u64) -> Option<u64> {
        self.deadline(key)
            .flatten()
            .map(|deadline| deadline.saturating_sub(now_ms))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.deadlines.keys()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_with_ttl() {
        let mut index = ExpiryIndex::new();
        index.stamp("a", 60, 1_000);

        assert_eq!(index.deadline("a"), Some(Some(61_000)));
        assert!(!index.is_expired("a", 60_999));
        assert!(index.is_expired("a", 61_000));
    }

    #[test]
    fn test_stamp_zero_never_expires() {
        let mut index = ExpiryIndex::new();
        index.stamp("a", 0, 1_000);

        assert_eq!(index.deadline("a"), Some(None));
        assert!(!index.is_expired("a", u64::MAX));
        assert!(index.ttl_remaining_ms("a", 5_000).is_none());
    }

    #[test]
    fn test_unindexed_key_is_not_expired() {
        let index = ExpiryIndex::new();
        assert!(!index.is_expired("missing", current_timestamp_ms()));
        assert_eq!(index.deadline("missing"), None);
    }

    #[test]
    fn test_restamp_overrides_deadline() {
        let mut index = ExpiryIndex::new();
        index.stamp("a", 1, 0);
        index.stamp("a", 0, 0);

        assert_eq!(index.len(), 1);
        assert_eq!(index.deadline("a"), Some(None));
    }

    #[test]
    fn test_ttl_remaining() {
        let mut index = ExpiryIndex::new();
        index.stamp("a", 10, 0);

        assert_eq!(index.ttl_remaining_ms("a", 4_000), Some(6_000));
        assert_eq!(index.ttl_remaining_ms("a", 20_000), Some(0));
    }

    #[test]
    fn test_encoding_is_stable() {
        let mut index = ExpiryIndex::new();
        index.stamp("b", 5, 100);
        index.stamp("a", 0, 100);

        let first = index.encode().unwrap();
        let second = index.encode().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, br#"{"a":null,"b":5100}"#.to_vec());
        assert_eq!(ExpiryIndex::decode(&first).unwrap(), index);
    }

    #[test]
    fn test_remove() {
        let mut index = ExpiryIndex::new();
        index.stamp("a", 5, 0);

        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert!(index.is_empty());
    }
}
