//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::HubHandle;
use crate::service::EventRouter;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the connection registry.
    pub hub: HubHandle,
    /// Namespace router for inbound client messages.
    pub router: Arc<EventRouter>,
    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,
}
