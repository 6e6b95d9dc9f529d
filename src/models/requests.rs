//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::{SetOptions, TabId};

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Request body for PUT /cache
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: serde_json::Value,
    /// Optional TTL in milliseconds (uses default if not specified)
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Tab the entry belongs to
    #[serde(default)]
    pub scope: Option<TabId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
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
        if self.tags.iter().any(String::is_empty) {
            return Some("Tags cannot be empty".to_string());
        }
        None
    }

    /// Cache options described by this request.
    pub fn options(&self) -> SetOptions {
        SetOptions {
            ttl: self.ttl_ms.map(Duration::from_millis),
            scope: self.scope.clone(),
            tags: self.tags.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(key: &str) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value: json!("<html></html>"),
            ttl_ms: None,
            scope: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_set_request_deserialize_minimal() {
        let req: SetRequest = serde_json::from_str(r#"{"key": "k", "value": {"a": 1}}"#).unwrap();
        assert_eq!(req.key, "k");
        assert_eq!(req.value, json!({"a": 1}));
        assert!(req.ttl_ms.is_none());
        assert!(req.scope.is_none());
        assert!(req.tags.is_empty());
    }

    #[test]
    fn test_set_request_options() {
        let req: SetRequest = serde_json::from_str(
            r#"{"key": "k", "value": 1, "ttl_ms": 250, "scope": "7", "tags": ["html", "html"]}"#,
        )
        .unwrap();
        let opts = req.options();

        assert_eq!(opts.ttl, Some(Duration::from_millis(250)));
        assert_eq!(opts.scope, Some(TabId::from("7")));
        assert_eq!(opts.tags.len(), 1);
    }

    #[test]
    fn test_validate_empty_key() {
        assert!(request("").validate().is_some());
    }

    #[test]
    fn test_validate_long_key() {
        assert!(request(&"k".repeat(MAX_KEY_LENGTH + 1)).validate().is_some());
    }

    #[test]
    fn test_validate_empty_tag() {
        let mut req = request("k");
        req.tags.push(String::new());
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        assert!(request("content:1:main").validate().is_none());
    }
}
