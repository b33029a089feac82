//! API Handlers
//!
//! HTTP request handlers for each shelf server endpoint.

use std::sync::Arc;
use tokio::sync::Mutex;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::CacheHandle;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    GetResponse, HealthResponse, KeysResponse, MessageResponse, SetRequest, StatsResponse,
};
use crate::store::{DynStore, FileStore};

/// Application state shared across all handlers.
///
/// The layers keep no internal locking, so the whole handle sits behind a
/// single mutex and every request holds it for the full operation.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Mutex<CacheHandle<DynStore>>>,
}

impl AppState {
    pub fn new(cache: CacheHandle<DynStore>) -> Self {
        Self {
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// Opens the configured shelf file and wraps it with the configured policies.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: DynStore = Box::new(FileStore::open(&config.path, config.flag)?);
        let cache = CacheHandle::new(store, config.maxsize, config.timeout)?;
        Ok(Self::new(cache))
    }
}

/// Handler for PUT /set
///
/// A request `ttl` overrides the default timeout and needs the TTL policy.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<MessageResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let mut cache = state.cache.lock().await;
    match req.ttl {
        Some(ttl) => cache.set_with_timeout(&req.key, &req.value, ttl)?,
        None => cache.set(&req.key, &req.value)?,
    }

    Ok(Json(MessageResponse::stored(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Reads mutate too: LRU touch, lazy purge, stats
    let mut cache = state.cache.lock().await;
    let value: Value = cache.get(&key)?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    let mut cache = state.cache.lock().await;
    cache.delete(&key)?;

    Ok(Json(MessageResponse::deleted(key)))
}

/// Handler for GET /keys
pub async fn keys_handler(State(state): State<AppState>) -> Result<Json<KeysResponse>> {
    let mut cache = state.cache.lock().await;
    let keys = cache.keys()?.collect::<Result<Vec<_>>>()?;

    Ok(Json(KeysResponse::new(keys)))
}

/// Handler for POST /sync
pub async fn sync_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let mut cache = state.cache.lock().await;
    cache.sync()?;

    Ok(Json(HealthResponse::healthy()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.lock().await;
    Json(StatsResponse::new(cache.policy_name(), cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limit;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn state(maxsize: Limit, timeout: Limit) -> AppState {
        let store: DynStore = Box::new(MemoryStore::new());
        AppState::new(CacheHandle::new(store, maxsize, timeout).unwrap())
    }

    fn set_request(key: &str, value: Value, ttl: Option<u64>) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = state(Limit::Bound(10), Limit::Bound(300));

        let req = set_request("test_key", json!({"n": 1}), None);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let response = get_handler(State(state), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = state(Limit::Bound(10), Limit::Bound(300));

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = state(Limit::Disabled, Limit::Disabled);

        let req = set_request("to_delete", json!("value"), None);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        delete_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .unwrap();

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_set_with_ttl_requires_timeout_policy() {
        let state = state(Limit::Bound(10), Limit::Disabled);

        let req = set_request("k", json!(1), Some(5));
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_keys_handler() {
        let state = state(Limit::Bound(2), Limit::Bound(300));
        for key in ["a", "b", "c"] {
            let req = set_request(key, json!(key), None);
            set_handler(State(state.clone()), Json(req)).await.unwrap();
        }

        let response = keys_handler(State(state)).await.unwrap();
        assert_eq!(response.keys, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = state(Limit::Bound(1), Limit::Disabled);
        for key in ["a", "b"] {
            let req = set_request(key, json!(0), None);
            set_handler(State(state.clone()), Json(req)).await.unwrap();
        }

        let response = stats_handler(State(state)).await;
        assert_eq!(response.policy, "lru");
        assert_eq!(response.stats.evictions, 1);
        assert_eq!(response.stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_sync_handler() {
        let state = state(Limit::Disabled, Limit::Bound(300));
        assert!(sync_handler(State(state)).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = state(Limit::Disabled, Limit::Disabled);

        let req = set_request("", json!("value"), None);
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
