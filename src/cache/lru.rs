//! Recency Queue Module
//!
//! Tracks access order of keys for LRU eviction.

use std::collections::VecDeque;

// == Recency Queue ==
/// Keys ordered by access recency, without duplicates.
///
/// Keys are stored in a VecDeque where:
/// - Front = Least recently used
/// - Back = Most recently used
#[derive(Debug, Default, Clone)]
pub struct RecencyQueue {
    order: VecDeque<String>,
}

impl RecencyQueue {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used (moves it to the back).
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_back(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the queue. Returns whether it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.order.iter().position(|k| k == key) {
            Some(pos) => {
                self.order.remove(pos);
                true
            }
            None => false,
        }
    }

    // == Pop Oldest ==
    /// Returns and removes the least recently used key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.front()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Iterates from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Snapshot of the queue, least recently used first.
    pub fn to_vec(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }
}
