//! Axum router configuration

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;

use super::handlers::{
    cache_stats, create_batch, delete_batch, get_batch, get_multipart, get_part, health_check,
    version_check,
};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes();

    let router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Batch preparation
        .route("/api/pcm", post(create_batch))
        .route("/api/pcm/{batch_id}", get(get_batch).delete(delete_batch))
        .route("/api/pcm/{batch_id}/parts/{part_name}", get(get_part))
        .route("/api/pcm/{batch_id}/multipart", get(get_multipart))
        // Debug and metrics endpoints
        .route("/debug/cache", get(cache_stats))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    let router = if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}
