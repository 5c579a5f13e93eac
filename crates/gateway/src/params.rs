//! Typed query parameters and response bodies for the HTTP API.
//!
//! Request bodies for `/store` and `/search` are the memory crate's
//! `PageSubmission` and `SearchQuery`; only shapes owned by the HTTP layer
//! live here.

use serde::{Deserialize, Serialize};

/// Largest page `/memories` returns, whatever `limit` asks for.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Query string of `GET /memories`.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ListParams {
    pub fn bounded_limit(&self) -> usize {
        self.limit.min(MAX_LIST_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub ai_ready: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub removed: usize,
}

/// Error body: `{"detail": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn list_params_defaults() {
        let p: ListParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.limit, 50);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn list_params_with_fields() {
        let p: ListParams = serde_json::from_value(json!({"limit": 5, "offset": 10})).unwrap();
        assert_eq!(p.limit, 5);
        assert_eq!(p.offset, 10);
    }

    #[test]
    fn list_limit_is_capped() {
        let p = ListParams {
            limit: 1_000_000,
            offset: 0,
        };
        assert_eq!(p.bounded_limit(), MAX_LIST_LIMIT);
        assert_eq!(ListParams::default().bounded_limit(), 50);
    }

    #[test]
    fn negative_offset_is_rejected() {
        assert!(serde_json::from_value::<ListParams>(json!({"offset": -1})).is_err());
    }
}
