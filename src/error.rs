//! Error types for the cache
//!
//! `ComputeError` is the only failure that crosses the cache boundary;
//! `CacheError` covers the admin HTTP surface.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Compute Error ==
/// Failure of a caller-supplied factory inside `get_or_compute`.
///
/// Cloning shares the underlying error, so every caller joined on the same
/// computation observes the identical failure.
#[derive(Error, Debug, Clone)]
#[error("{0:#}")]
pub struct ComputeError(Arc<anyhow::Error>);

impl ComputeError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }

    /// Error reported when a factory panics instead of returning.
    pub fn panicked(key: &str) -> Self {
        Self::new(anyhow::anyhow!("computation for {} panicked", key))
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns true if both values come from the same failed computation.
    pub fn same_failure(&self, other: &ComputeError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// == Cache Error Enum ==
/// Errors surfaced by the admin API.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found (or expired) in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ComputeError> for CacheError {
    fn from(err: ComputeError) -> Self {
        CacheError::Internal(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the admin API.
pub type Result<T> = std::result::Result<T, CacheError>;
