//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` while the hub loop runs, `"unavailable"` otherwise.
    pub status: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Currently registered WebSocket connections.
    pub connections: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns hub status, version, connected client count and current timestamp.",
    responses(
        (status = 200, description = "Hub is running", body = HealthResponse),
        (status = 503, description = "Hub loop has stopped", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label, connections) = match state.hub.connection_count().await {
        Ok(n) => (StatusCode::OK, "healthy", n),
        Err(err) => {
            tracing::error!(error = %err, "health check: hub unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable", 0)
        }
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connections,
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
