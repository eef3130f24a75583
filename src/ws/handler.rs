//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// No sub-protocol is negotiated and no credentials are checked.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.hub.clone();
    let router = Arc::clone(&state.router);
    let outbound_capacity = state.outbound_capacity;

    ws.on_upgrade(move |socket| run_connection(socket, hub, router, outbound_capacity))
}
