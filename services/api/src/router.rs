//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application:
//! the credential endpoint, the per-domain session endpoints, and the
//! OpenAPI documentation.

use crate::{
    handlers,
    handlers::ConnectionStateResponse,
    models::{ConnectionDetails, ErrorResponse, ReplyPayload},
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use duet_core::{
    AgentDomain, ConversationMessage, MessageKind, OrderItem, RealtimeConnectionState,
    SessionSnapshot, Speaker, ToolStatus,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::connection_details,
        handlers::session_snapshot,
        handlers::send_reply,
        handlers::connect,
        handlers::disconnect,
    ),
    components(
        schemas(
            ConnectionDetails,
            ReplyPayload,
            ErrorResponse,
            ConnectionStateResponse,
            SessionSnapshot,
            ConversationMessage,
            Speaker,
            MessageKind,
            ToolStatus,
            OrderItem,
            RealtimeConnectionState,
            AgentDomain
        )
    ),
    tags(
        (name = "Duet API", description = "Session orchestration for the dual-agent concierge")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    // `/api/{endpoint}` catches `{domain}-connection-details`; the session
    // routes have a second path segment so the two patterns never overlap.
    let api_router = Router::new()
        .route("/api/{endpoint}", get(handlers::connection_details))
        .route("/api/{domain}/session", get(handlers::session_snapshot))
        .route("/api/{domain}/reply", post(handlers::send_reply))
        .route("/api/{domain}/connect", post(handlers::connect))
        .route("/api/{domain}/disconnect", post(handlers::disconnect))
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI routes.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
