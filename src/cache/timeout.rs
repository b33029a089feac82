//! Timeout Layer Module
//!
//! Adds per-key expiry on top of any `Store`. Deadlines live in an
//! `ExpiryIndex` persisted as one reserved record inside the wrapped store;
//! that record is hidden from reads, writes, iteration, length and
//! containment. Expired keys are purged lazily, when touched.

use std::collections::HashSet;
use std::mem;

use tracing::debug;

use crate::cache::expiry::{current_timestamp_ms, ExpiryIndex};
use crate::config::Limit;
use crate::error::{CacheError, Result};
use crate::store::Store;

/// Reserved key holding the serialized expiry index.
pub const INDEX_KEY: &str = "9c1e5b7f04a3d2e86b0f7a41c3d95e2870b6f1ad";

// == Timeout Layer ==
/// A store wrapper enforcing per-key time-to-live.
#[derive(Debug)]
pub struct TimeoutLayer<S: Store> {
    inner: S,
    index: ExpiryIndex,
    /// Default TTL in seconds; zero means new keys never expire
    timeout: u64,
    /// Filled only once a wrapping layer asked for removals
    purged: Vec<String>,
    tracking: bool,
    /// Set while the stored index record lags behind `index`
    index_pending: bool,
    closed: bool,
}

impl<S: Store> TimeoutLayer<S> {
    // == Constructor ==
    /// Wraps `inner`, loading the expiry index from its reserved record or
    /// creating one.
    ///
    /// The loaded index is reconciled with the store before returning:
    /// records without a deadline are adopted with the default timeout,
    /// deadlines without a record are dropped, and expired keys are purged.
    pub fn new(mut inner: S, timeout: u64) -> Result<Self> {
        let (index, loaded) = match inner.get(INDEX_KEY) {
            Ok(bytes) => (ExpiryIndex::decode(&bytes)?, true),
            Err(CacheError::NotFound(_)) => (ExpiryIndex::new(), false),
            Err(e) => return Err(e),
        };

        let mut layer = Self {
            inner,
            index,
            timeout,
            purged: Vec::new(),
            tracking: false,
            index_pending: false,
            closed: false,
        };

        let changed = layer.reconcile()?;
        if !loaded || changed {
            layer.write_index()?;
        }
        // Nothing above us has seen these keys yet.
        layer.purged.clear();

        Ok(layer)
    }

    /// Like `new`, but takes the bound as configured. A disabled bound is
    /// rejected because this layer needs a concrete default.
    pub fn with_limit(inner: S, timeout: Limit) -> Result<Self> {
        match timeout.bound() {
            Some(timeout) => Self::new(inner, timeout),
            None => Err(CacheError::InvalidConfig(
                "timeout must be a non-negative integer".to_string(),
            )),
        }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Changes the default TTL applied by later `set` calls.
    pub fn set_timeout(&mut self, timeout: u64) {
        self.timeout = timeout;
    }

    pub fn expiry_index(&self) -> &ExpiryIndex {
        &self.index
    }

    /// Remaining lifetime of `key` in milliseconds, `None` if it never expires.
    pub fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        self.index.ttl_remaining_ms(key, current_timestamp_ms())
    }

    // == Set With Timeout ==
    /// Stores `value` with an explicit TTL in seconds, ignoring the default.
    ///
    /// A `ttl` of zero makes the key permanent.
    pub fn set_with_timeout(&mut self, key: &str, value: Vec<u8>, ttl: u64) -> Result<()> {
        Self::guard(key)?;
        self.inner.set(key, value)?;
        self.index.stamp(key, ttl, current_timestamp_ms());
        self.write_index()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Synchronizes the index and hands back the wrapped store.
    pub fn into_inner(mut self) -> Result<S> {
        self.sync()?;
        Ok(self.inner)
    }

    fn guard(key: &str) -> Result<()> {
        if key == INDEX_KEY {
            return Err(CacheError::ProtectedKey(key.to_string()));
        }
        Ok(())
    }

    fn write_index(&mut self) -> Result<()> {
        self.index_pending = true;
        let bytes = self.index.encode()?;
        self.inner.set(INDEX_KEY, bytes)?;
        self.index_pending = false;
        Ok(())
    }

    fn reconcile(&mut self) -> Result<bool> {
        let now = current_timestamp_ms();
        let stored: Vec<String> = self
            .inner
            .key_snapshot()
            .into_iter()
            .filter(|k| k != INDEX_KEY)
            .collect();

        let mut changed = false;
        for key in &stored {
            if !self.index.contains(key) {
                self.index.stamp(key, self.timeout, now);
                changed = true;
            }
        }

        let present: HashSet<&str> = stored.iter().map(String::as_str).collect();
        let stale: Vec<String> = self
            .index
            .keys()
            .filter(|k| !present.contains(k.as_str()))
            .cloned()
            .collect();
        for key in &stale {
            self.index.remove(key);
            changed = true;
        }

        let mut purged = 0;
        for key in &stored {
            if self.purge_if_expired(key)? {
                purged += 1;
            }
        }

        debug!(
            keys = stored.len(),
            stale = stale.len(),
            purged,
            "Reconciled expiry index"
        );
        Ok(changed)
    }

    // == Lazy Purge ==
    /// Deletes `key` from the store and the index if its deadline has passed.
    fn purge_if_expired(&mut self, key: &str) -> Result<bool> {
        if !self.index.is_expired(key, current_timestamp_ms()) {
            return Ok(false);
        }

        match self.inner.delete(key) {
            Ok(()) | Err(CacheError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.index.remove(key);
        self.write_index()?;
        if self.tracking {
            self.purged.push(key.to_string());
        }

        debug!(key, "Purged expired entry");
        Ok(true)
    }
}

impl<S: Store> Store for TimeoutLayer<S> {
    fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        Self::guard(key)?;
        if self.purge_if_expired(key)? {
            return Err(CacheError::NotFound(key.to_string()));
        }
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        let ttl = self.timeout;
        self.set_with_timeout(key, value, ttl)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        Self::guard(key)?;
        self.inner.delete(key)?;
        self.index.remove(key);
        self.write_index()
    }

    fn contains(&mut self, key: &str) -> Result<bool> {
        if key == INDEX_KEY || !self.inner.contains(key)? {
            return Ok(false);
        }
        Ok(!self.purge_if_expired(key)?)
    }

    /// Excludes the index record. Expired keys not yet purged still count.
    fn len(&self) -> usize {
        self.inner.len().saturating_sub(1)
    }

    fn key_snapshot(&self) -> Vec<String> {
        self.inner
            .key_snapshot()
            .into_iter()
            .filter(|k| k != INDEX_KEY)
            .collect()
    }

    fn sync(&mut self) -> Result<()> {
        if self.index_pending {
            self.write_index()?;
        }
        self.inner.sync()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.sync()?;
        self.inner.close()?;
        self.closed = true;
        Ok(())
    }

    fn track_removals(&mut self) {
        self.tracking = true;
    }

    fn take_purged(&mut self) -> Vec<String> {
        mem::take(&mut self.purged)
    }
}
