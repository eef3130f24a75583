//! HTTP surface: router composition and OpenAPI document.
//!
//! The hub exposes two routes: the WebSocket upgrade at `/ws` and the
//! health check at `/health`. Everything else in the service lives
//! behind other processes.

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for the HTTP routes.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "resqlink-hub", description = "Real-time notification hub"),
    paths(handlers::system::health_handler),
    components(schemas(handlers::system::HealthResponse)),
    tags((name = "System", description = "Service status"))
)]
pub struct ApiDoc;

/// Builds the complete application: routes, middleware and state.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .merge(handlers::system::routes())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
