//! LRU Layer Module
//!
//! Bounds the number of keys in a wrapped store by evicting the least
//! recently used key whenever the bound is exceeded. The recency queue is
//! process-local: on construction it is seeded from the wrapped store's
//! live keys in native iteration order, which only approximates the
//! recency the previous process observed.
//!
//! The reserved expiry index record is never queued, so a shelf written
//! with the timeout policy can be reopened LRU-only without evicting its
//! deadlines.

use std::mem;

use tracing::{debug, warn};

use crate::cache::lru::RecencyQueue;
use crate::cache::timeout::{TimeoutLayer, INDEX_KEY};
use crate::config::Limit;
use crate::error::{CacheError, Result};
use crate::store::Store;

// == LRU Layer ==
/// A store wrapper enforcing a maximum key count.
#[derive(Debug)]
pub struct LruLayer<S: Store> {
    inner: S,
    queue: RecencyQueue,
    /// Maximum number of keys; zero means unlimited
    maxsize: usize,
    evictions: u64,
    /// Filled only once a wrapping layer asked for removals
    removed: Vec<String>,
    tracking: bool,
}

impl<S: Store> LruLayer<S> {
    // == Constructor ==
    /// Wraps `inner` and seeds the queue from its live keys.
    ///
    /// If the store already holds more than `maxsize` keys, the excess is
    /// evicted before returning.
    pub fn new(mut inner: S, maxsize: usize) -> Result<Self> {
        inner.track_removals();
        let keys: Vec<String> = inner.keys().collect::<Result<_>>()?;
        inner.take_purged();

        let mut layer = Self {
            inner,
            queue: RecencyQueue::new(),
            maxsize,
            evictions: 0,
            removed: Vec::new(),
            tracking: false,
        };
        for key in &keys {
            layer.touch(key)?;
        }

        debug!(
            seeded = keys.len(),
            evicted = layer.evictions,
            maxsize,
            "Seeded recency queue"
        );
        Ok(layer)
    }

    /// Like `new`, but takes the bound as configured. A disabled bound is
    /// rejected because this layer needs a concrete maximum.
    pub fn with_limit(inner: S, maxsize: Limit) -> Result<Self> {
        match maxsize.bound() {
            Some(maxsize) => {
                let maxsize = usize::try_from(maxsize).map_err(|_| {
                    CacheError::InvalidConfig(format!(
                        "maxsize {} does not fit this platform",
                        maxsize
                    ))
                })?;
                Self::new(inner, maxsize)
            }
            None => Err(CacheError::InvalidConfig(
                "maxsize must be a non-negative integer".to_string(),
            )),
        }
    }

    pub fn maxsize(&self) -> usize {
        self.maxsize
    }

    /// Changes the bound. A smaller bound is enforced on the next touch,
    /// not here.
    pub fn set_maxsize(&mut self, maxsize: usize) {
        self.maxsize = maxsize;
    }

    pub fn queue(&self) -> &RecencyQueue {
        &self.queue
    }

    /// Keys from least to most recently used.
    pub fn recency(&self) -> Vec<String> {
        self.queue.to_vec()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    // == Touch ==
    /// Marks `key` most recently used, then evicts from the head of the
    /// queue until the bound holds.
    pub fn touch(&mut self, key: &str) -> Result<()> {
        if key == INDEX_KEY {
            return Ok(());
        }
        self.queue.touch(key);
        if self.maxsize == 0 {
            return Ok(());
        }

        while self.queue.len() > self.maxsize {
            let Some(oldest) = self.queue.pop_oldest() else {
                break;
            };
            match self.inner.delete(&oldest) {
                Ok(()) => {
                    self.evictions += 1;
                    debug!(key = %oldest, maxsize = self.maxsize, "Evicted least recently used entry");
                }
                Err(CacheError::NotFound(_)) => {
                    warn!(key = %oldest, "Recency queue tracked a key missing from the store");
                }
                Err(e) => return Err(e),
            }
            self.forget_purged();
            if self.tracking {
                self.removed.push(oldest);
            }
        }
        Ok(())
    }

    /// Drops keys the wrapped store removed by itself (expiry purges) from
    /// the queue, the same way an explicit delete does.
    fn forget_purged(&mut self) {
        for key in self.inner.take_purged() {
            self.forget(&key);
        }
    }

    fn forget(&mut self, key: &str) {
        if self.queue.remove(key) && self.tracking {
            self.removed.push(key.to_string());
        }
    }
}

impl<S: Store> LruLayer<TimeoutLayer<S>> {
    /// Stores `value` with an explicit TTL, then touches the key.
    pub fn set_with_timeout(&mut self, key: &str, value: Vec<u8>, ttl: u64) -> Result<()> {
        self.inner.set_with_timeout(key, value, ttl)?;
        self.forget_purged();
        self.touch(key)
    }
}

impl<S: Store> Store for LruLayer<S> {
    fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        let result = self.inner.get(key);
        self.forget_purged();
        let value = result?;
        self.touch(key)?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        let result = self.inner.set(key, value);
        self.forget_purged();
        result?;
        self.touch(key)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let result = self.inner.delete(key);
        self.forget_purged();
        result?;
        self.queue.remove(key);
        Ok(())
    }

    fn contains(&mut self, key: &str) -> Result<bool> {
        let result = self.inner.contains(key);
        self.forget_purged();
        result
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn key_snapshot(&self) -> Vec<String> {
        self.inner.key_snapshot()
    }

    fn sync(&mut self) -> Result<()> {
        self.inner.sync()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn track_removals(&mut self) {
        self.tracking = true;
    }

    fn take_purged(&mut self) -> Vec<String> {
        mem::take(&mut self.removed)
    }
}
