//! Cache Handle Module
//!
//! Chooses which policy layers wrap a store and exposes the result as a
//! typed mapping. Values are encoded with serde_json before they reach the
//! store, so any `Serialize`/`DeserializeOwned` type can be cached.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::lru_layer::LruLayer;
use crate::cache::stats::CacheStats;
use crate::cache::timeout::TimeoutLayer;
use crate::config::Limit;
use crate::error::{CacheError, Result};
use crate::store::{FileStore, Keys, OpenFlag, Store};

// == Policy ==
/// The four ways a store can be wrapped.
#[derive(Debug)]
pub enum Policy<S: Store> {
    Plain(S),
    Timeout(TimeoutLayer<S>),
    Lru(LruLayer<S>),
    LruTimeout(LruLayer<TimeoutLayer<S>>),
}

impl<S: Store> Policy<S> {
    /// Wraps `store` according to the two bounds. The timeout layer is
    /// built first so the LRU layer seeds from already-purged keys.
    pub fn new(store: S, maxsize: Limit, timeout: Limit) -> Result<Self> {
        let policy = match (maxsize.is_enabled(), timeout.is_enabled()) {
            (false, false) => Policy::Plain(store),
            (false, true) => Policy::Timeout(TimeoutLayer::with_limit(store, timeout)?),
            (true, false) => Policy::Lru(LruLayer::with_limit(store, maxsize)?),
            (true, true) => {
                let timeout = TimeoutLayer::with_limit(store, timeout)?;
                Policy::LruTimeout(LruLayer::with_limit(timeout, maxsize)?)
            }
        };
        Ok(policy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Policy::Plain(_) => "plain",
            Policy::Timeout(_) => "timeout",
            Policy::Lru(_) => "lru",
            Policy::LruTimeout(_) => "lru+timeout",
        }
    }

    pub fn store(&self) -> &dyn Store {
        match self {
            Policy::Plain(s) => s,
            Policy::Timeout(t) => t,
            Policy::Lru(l) => l,
            Policy::LruTimeout(l) => l,
        }
    }

    pub fn store_mut(&mut self) -> &mut dyn Store {
        match self {
            Policy::Plain(s) => s,
            Policy::Timeout(t) => t,
            Policy::Lru(l) => l,
            Policy::LruTimeout(l) => l,
        }
    }

    fn evictions(&self) -> u64 {
        match self {
            Policy::Lru(l) => l.evictions(),
            Policy::LruTimeout(l) => l.evictions(),
            Policy::Plain(_) | Policy::Timeout(_) => 0,
        }
    }

    /// Synchronizes and unwraps every layer.
    fn into_store(self) -> Result<S> {
        match self {
            Policy::Plain(mut s) => {
                s.sync()?;
                Ok(s)
            }
            Policy::Timeout(t) => t.into_inner(),
            Policy::Lru(l) => {
                let mut s = l.into_inner();
                s.sync()?;
                Ok(s)
            }
            Policy::LruTimeout(l) => l.into_inner().into_inner(),
        }
    }
}

fn requires(policy: &str, operation: &str) -> CacheError {
    CacheError::UnsupportedOperation(format!("{} requires the {} policy", operation, policy))
}

// == Cache Handle ==
/// A typed, policy-wrapped view of a store.
///
/// The handle is closed when dropped; close it explicitly to observe
/// synchronization errors.
pub struct CacheHandle<S: Store> {
    policy: Option<Policy<S>>,
    stats: CacheStats,
}

impl<S: Store> CacheHandle<S> {
    // == Constructor ==
    /// Wraps an open store. `Limit::Disabled` turns a policy off;
    /// `Limit::Bound(0)` keeps it on with no size limit or no expiry.
    pub fn new(store: S, maxsize: Limit, timeout: Limit) -> Result<Self> {
        let policy = Policy::new(store, maxsize, timeout)?;
        info!(
            policy = policy.name(),
            maxsize = %maxsize,
            timeout = %timeout,
            entries = policy.store().len(),
            "Opened cache"
        );
        Ok(Self {
            policy: Some(policy),
            stats: CacheStats::new(),
        })
    }

    /// `"plain"`, `"timeout"`, `"lru"` or `"lru+timeout"`; `"closed"` after close.
    pub fn policy_name(&self) -> &'static str {
        self.policy.as_ref().map_or("closed", Policy::name)
    }

    fn policy_mut(&mut self) -> Result<&mut Policy<S>> {
        self.policy.as_mut().ok_or(CacheError::Closed)
    }

    fn store_mut(&mut self) -> Result<&mut dyn Store> {
        Ok(self.policy_mut()?.store_mut())
    }

    // == Get ==
    /// Returns the value under `key`. Absent and expired keys both fail
    /// with `NotFound`.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<T> {
        let result = self.store_mut()?.get(key);
        match result {
            Ok(bytes) => {
                self.stats.record_hit();
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(e) => {
                if matches!(e, CacheError::NotFound(_)) {
                    self.stats.record_miss();
                }
                Err(e)
            }
        }
    }

    /// Like `get`, but a missing key yields `default`.
    pub fn get_or<T: DeserializeOwned>(&mut self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Err(CacheError::NotFound(_)) => Ok(default),
            other => other,
        }
    }

    // == Set ==
    /// Stores `value`, stamped with the default timeout when the TTL policy
    /// is active.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store_mut()?.set(key, bytes)
    }

    /// Stores `value` with an explicit TTL in seconds; zero never expires.
    pub fn set_with_timeout<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl: u64,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        match self.policy_mut()? {
            Policy::Timeout(t) => t.set_with_timeout(key, bytes, ttl),
            Policy::LruTimeout(l) => l.set_with_timeout(key, bytes, ttl),
            Policy::Plain(_) | Policy::Lru(_) => Err(requires("timeout", "set_with_timeout")),
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value, or computes, stores and returns a new one.
    pub fn get_or_compute<T, F>(&mut self, key: &str, factory: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.get(key) {
            Err(CacheError::NotFound(_)) => {
                let value = factory();
                self.set(key, &value)?;
                Ok(value)
            }
            other => other,
        }
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.store_mut()?.delete(key)
    }

    /// Removes and returns the value under `key`.
    pub fn pop<T: DeserializeOwned>(&mut self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        self.delete(key)?;
        Ok(value)
    }

    pub fn contains(&mut self, key: &str) -> Result<bool> {
        self.store_mut()?.contains(key)
    }

    /// Stored entry count. Expired entries nobody has touched yet still
    /// count; iterate first for an exact live count.
    pub fn len(&self) -> usize {
        self.policy.as_ref().map_or(0, |p| p.store().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Enumeration ==
    /// Lazy iterator over live keys; expired keys met on the way are purged.
    pub fn keys(&mut self) -> Result<Keys<'_, dyn Store + '_>> {
        Ok(Keys::new(self.store_mut()?))
    }

    fn key_list(&mut self) -> Result<Vec<String>> {
        self.keys()?.collect()
    }

    /// Every live `(key, value)` pair. Reads go through the policies, so
    /// under LRU each key is touched in iteration order.
    pub fn items<T: DeserializeOwned>(&mut self) -> Result<Vec<(String, T)>> {
        let mut items = Vec::new();
        for key in self.key_list()? {
            match self.get(&key) {
                Ok(value) => items.push((key, value)),
                Err(CacheError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }

    pub fn values<T: DeserializeOwned>(&mut self) -> Result<Vec<T>> {
        Ok(self.items()?.into_iter().map(|(_, v)| v).collect())
    }

    /// Sets every pair in order.
    pub fn update<I, K, T>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: Serialize,
    {
        for (key, value) in entries {
            self.set(key.as_ref(), &value)?;
        }
        Ok(())
    }

    /// Deletes every live key.
    pub fn clear(&mut self) -> Result<()> {
        for key in self.key_list()? {
            match self.delete(&key) {
                Ok(()) | Err(CacheError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // == Policy Introspection ==
    pub fn maxsize(&self) -> Result<usize> {
        match self.policy.as_ref().ok_or(CacheError::Closed)? {
            Policy::Lru(l) => Ok(l.maxsize()),
            Policy::LruTimeout(l) => Ok(l.maxsize()),
            _ => Err(requires("lru", "maxsize")),
        }
    }

    /// Takes effect on the next get or set.
    pub fn set_maxsize(&mut self, maxsize: usize) -> Result<()> {
        match self.policy_mut()? {
            Policy::Lru(l) => l.set_maxsize(maxsize),
            Policy::LruTimeout(l) => l.set_maxsize(maxsize),
            _ => return Err(requires("lru", "set_maxsize")),
        }
        Ok(())
    }

    /// Keys from least to most recently used.
    pub fn recency(&self) -> Result<Vec<String>> {
        match self.policy.as_ref().ok_or(CacheError::Closed)? {
            Policy::Lru(l) => Ok(l.recency()),
            Policy::LruTimeout(l) => Ok(l.recency()),
            _ => Err(requires("lru", "recency")),
        }
    }

    pub fn timeout(&self) -> Result<u64> {
        match self.policy.as_ref().ok_or(CacheError::Closed)? {
            Policy::Timeout(t) => Ok(t.timeout()),
            Policy::LruTimeout(l) => Ok(l.inner().timeout()),
            _ => Err(requires("timeout", "timeout")),
        }
    }

    pub fn set_timeout(&mut self, timeout: u64) -> Result<()> {
        match self.policy_mut()? {
            Policy::Timeout(t) => t.set_timeout(timeout),
            Policy::LruTimeout(l) => l.inner_mut().set_timeout(timeout),
            _ => return Err(requires("timeout", "set_timeout")),
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let evictions = self.policy.as_ref().map_or(0, Policy::evictions);
        self.stats.snapshot(evictions, self.len())
    }

    // == Lifecycle ==
    /// Persists the expiry index (if any) and flushes the store.
    pub fn sync(&mut self) -> Result<()> {
        self.store_mut()?.sync()
    }

    /// Synchronizes and closes the store. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut policy) = self.policy.take() else {
            return Ok(());
        };
        policy.store_mut().close()?;
        info!(policy = policy.name(), "Closed cache");
        Ok(())
    }

    /// Synchronizes and returns the bare store, dropping the policies.
    pub fn into_store(mut self) -> Result<S> {
        let policy = self.policy.take().ok_or(CacheError::Closed)?;
        policy.into_store()
    }
}

impl<S: Store> Drop for CacheHandle<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close cache on drop");
        }
    }
}

impl<S: Store> fmt::Debug for CacheHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("policy", &self.policy_name())
            .field("len", &self.len())
            .finish()
    }
}

// == Open ==
/// Opens the shelf file at `path` and wraps it according to the bounds.
///
/// A file last written with the timeout policy holds the expiry index
/// record. Opened without that policy the record shows up as an ordinary
/// key; the LRU layer never evicts it, so the deadlines come back when the
/// file is reopened with a timeout.
pub fn open(
    path: impl AsRef<Path>,
    flag: OpenFlag,
    maxsize: Limit,
    timeout: Limit,
) -> Result<CacheHandle<FileStore>> {
    let store = FileStore::open(path, flag)?;
    CacheHandle::new(store, maxsize, timeout)
}
