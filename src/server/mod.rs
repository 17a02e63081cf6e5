//! HTTP surface: health, metrics and the websocket channel endpoint

mod websocket;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the router for the bridge
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/ws", get(websocket::upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "recent-orders-bridge",
        "open_channels": state.bridge.registry().open_channels().await,
        "override_instance": state.config.override_instance_key,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, (StatusCode, String)> {
    state
        .bridge
        .metrics()
        .render()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
