//! Response DTOs for the shelf server API

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;

/// Response body for GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /set and DELETE /del/:key
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub key: String,
}

impl MessageResponse {
    pub fn stored(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /keys
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<String>,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Active policy layers
    pub policy: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(policy: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            policy: policy.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
