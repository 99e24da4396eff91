//! HTTP surface
//!
//! Assembles the feature routes with the health endpoint and the middleware stack.

pub mod response;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::features::{self, FeatureState};
use crate::middleware;
use crate::session::SessionLayer;

/// Create the application router with all routes and middleware
pub fn create_router(state: FeatureState, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state.clone())
        .merge(features::router(state))
        // Apply layers from innermost to outermost
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(SessionLayer)
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check(State(state): State<FeatureState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "jobs": state.runner.store().len().await,
        "sessions": state.sessions.len().await,
    }))
}
