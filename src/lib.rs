//! Timeshelf - a persistent key/value shelf with LRU and TTL policies
//!
//! A store is wrapped by up to two layers: `TimeoutLayer` expires keys
//! lazily on access, and `LruLayer` bounds the key count by evicting the
//! least recently used key. `open` picks the combination from two bounds.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use api::AppState;
pub use cache::{open, CacheHandle};
pub use config::{Config, Limit};
pub use error::{CacheError, Result};
pub use store::{FileStore, MemoryStore, OpenFlag, Store};
