//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::{
    clear_handler, delete_handler, get_handler, health_handler, invalidate_prefix_handler,
    invalidate_tab_handler, invalidate_tag_handler, publish_mutation_handler, set_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache` - Store a value with optional TTL, scope and tags
/// - `DELETE /cache` - Clear the cache
/// - `GET /cache/:key` - Retrieve a value by key
/// - `DELETE /cache/:key` - Delete a key
/// - `POST /invalidate/tag/:tag` - Remove entries carrying a tag
/// - `POST /invalidate/tab/:tab_id` - Remove everything belonging to a tab
/// - `POST /invalidate/prefix/:prefix` - Remove keys with a prefix
/// - `POST /mutations` - Publish a tab mutation event
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router with cache, invalidation and mutation endpoints
    Router::new()
        .route("/cache", put(set_handler).delete(clear_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route("/invalidate/tag/:tag", post(invalidate_tag_handler))
        .route("/invalidate/tab/:tab_id", post(invalidate_tab_handler))
        .route("/invalidate/prefix/:prefix", post(invalidate_prefix_handler))
        .route("/mutations", post(publish_mutation_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
