//! Cache Module
//!
//! Policy layers over a `Store`: per-key TTL expiry, LRU size bounding, and
//! the handle that composes them.

mod expiry;
mod handle;
mod lru;
mod lru_layer;
mod stats;
mod timeout;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use expiry::{current_timestamp_ms, ExpiryIndex};
pub use handle::{open, CacheHandle, Policy};
pub use lru::RecencyQueue;
pub use lru_layer::LruLayer;
pub use stats::CacheStats;
pub use timeout::{TimeoutLayer, INDEX_KEY};

// == Public Constants ==
/// Maximum allowed key length in bytes for requests to the server
pub const MAX_KEY_LENGTH: usize = 256;
