//! HTTP surface: REST handlers, DTOs, the WebSocket route and router
//! composition.
//!
//! REST endpoints are mounted under `/api/v1`; the chat socket lives at
//! `/ws/{client_name}`.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "PrismEcho Backend", description = "Moderated real-time group chat"),
    paths(
        handlers::system::root_handler,
        handlers::system::health_handler,
        handlers::chat::moderate,
        handlers::chat::summarize,
        handlers::chat::open_topic,
        handlers::chat::connections,
    ),
    tags(
        (name = "System", description = "Service status"),
        (name = "Chat", description = "Moderation, augmentation and room control"),
    )
)]
pub struct ApiDoc;

/// Builds the REST router.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the complete application: REST, WebSocket and HTTP layers.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws/{client_name}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
