//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{ScopeCache, TabId};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, InvalidateResponse, PublishResponse, SetRequest,
    SetResponse, StatsResponse,
};
use crate::mutations::{BroadcastNotifier, MutationEvent};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache of JSON payloads
    pub cache: ScopeCache<serde_json::Value>,
    /// Mutation source the cache is subscribed to
    pub notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    pub fn new(cache: ScopeCache<serde_json::Value>, notifier: Arc<BroadcastNotifier>) -> Self {
        Self { cache, notifier }
    }

    /// Creates the cache from `config` and subscribes it to a fresh notifier.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: &CacheConfig) -> Self {
        let notifier = Arc::new(BroadcastNotifier::new());
        let cache = ScopeCache::with_notifier(config.clone(), notifier.clone());
        Self::new(cache, notifier)
    }
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let opts = req.options();
    state.cache.set(req.key.clone(), req.value, opts).await;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let removed = state.cache.delete(&key).await;
    Json(DeleteResponse::new(key, removed))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    state.cache.clear().await;
    Json(state.cache.stats().await.into())
}

/// Handler for POST /invalidate/tag/:tag
pub async fn invalidate_tag_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state.cache.clear_by_tag(&tag).await;
    Json(InvalidateResponse::new("tag", &tag, removed))
}

/// Handler for POST /invalidate/tab/:tab_id
pub async fn invalidate_tab_handler(
    State(state): State<AppState>,
    Path(tab_id): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state.cache.invalidate_scope(&TabId::new(tab_id.as_str())).await;
    Json(InvalidateResponse::new("tab", &tab_id, removed))
}

/// Handler for POST /invalidate/prefix/:prefix
pub async fn invalidate_prefix_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    if prefix.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Prefix cannot be empty".to_string(),
        ));
    }
    let removed = state.cache.clear_by_prefix(&prefix).await;
    Ok(Json(InvalidateResponse::new("prefix", &prefix, removed)))
}

/// Handler for POST /mutations
///
/// Publishes a mutation event as if it came from the page; subscribed
/// caches invalidate the event's tab.
pub async fn publish_mutation_handler(
    State(state): State<AppState>,
    Json(event): Json<MutationEvent>,
) -> Json<PublishResponse> {
    let delivered = state.notifier.publish(&event);
    Json(PublishResponse { delivered })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await.into())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
