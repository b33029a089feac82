//! Request DTOs for the shelf server API

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for PUT /set
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    /// Any JSON value
    pub value: Value,
    /// Per-key TTL in seconds, overriding the shelf default; 0 never expires
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": [1, 2]}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, json!([1, 2]));
        assert!(req.ttl.is_none());
    }

    #[test]
    fn test_set_request_with_ttl() {
        let json = r#"{"key": "test", "value": "hello", "ttl": 0}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl, Some(0));
    }

    #[test]
    fn test_validate() {
        let mut req = SetRequest {
            key: "".to_string(),
            value: json!("test"),
            ttl: None,
        };
        assert!(req.validate().is_some());

        req.key = "k".repeat(MAX_KEY_LENGTH + 1);
        assert!(req.validate().is_some());

        req.key = "valid_key".to_string();
        assert!(req.validate().is_none());
    }
}
