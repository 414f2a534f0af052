//! API layer for the gateway.
//!
//! This module contains the HTTP handlers, request/response models, the
//! authorizer, and the WebSocket streaming endpoint.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod handlers;
pub mod models;
pub mod ws;

// Re-export commonly used types
pub use auth::{authorize, Identity};
pub use handlers::{chat_completions, health, metrics_handler, AppState};
pub use models::{CompletionRequest, HealthResponse};

use crate::core::middleware::MetricsMiddleware;

/// Build the full application router over the shared state.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/chat/completions", post(chat_completions))
        .route("/ws/v1/chat/completions", get(ws::ws_chat_completions))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
