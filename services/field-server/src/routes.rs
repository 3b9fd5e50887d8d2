//! HTTP routes.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

/// Build the application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Field reads
        .route("/fields/headers", post(handlers::fields::headers_handler))
        .route("/fields/volume", post(handlers::fields::volume_handler))
        .route("/fields/vsection", post(handlers::fields::vsection_handler))
        .route("/fields/time-list", post(handlers::fields::time_list_handler))
        .route(
            "/fields/time-height",
            post(handlers::fields::time_height_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
