//! Axum Handlers for the REST API
//!
//! The credential endpoint follows the presentation shell's original
//! contract exactly (camelCase body, `Cache-Control: no-store`, plain-text
//! `500` with the configuration error message). The session endpoints
//! expose the per-domain timeline and realtime lifecycle.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use duet_core::{AgentDomain, RealtimeConnectionState, SessionSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    models::{ConnectionDetails, ErrorResponse, ReplyPayload},
    realtime::ConnectError,
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    Conflict(String),
    /// Missing or invalid realtime configuration. The message names the
    /// unresolved variable so the operator can act on it.
    Configuration(String),
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Configuration(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { message }),
            )
                .into_response(),
            ApiError::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

fn parse_domain(raw: &str) -> Result<AgentDomain, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown agent domain: '{raw}'")))
}

/// The realtime connection state after a lifecycle operation.
#[derive(Serialize, ToSchema)]
pub struct ConnectionStateResponse {
    pub connection: RealtimeConnectionState,
}

/// Issue fresh realtime connection details for one domain.
///
/// The route is `/api/{domain}-connection-details`; the suffix keeps the
/// original shell's endpoint names (`/api/shopping-connection-details`).
#[utoipa::path(
    get,
    path = "/api/{domain}-connection-details",
    responses(
        (status = 200, description = "Freshly issued room credential", body = ConnectionDetails),
        (status = 404, description = "Unknown domain"),
        (status = 500, description = "Realtime configuration missing", body = String)
    ),
    params(
        ("domain" = String, Path, description = "Agent domain: 'restaurant' or 'shopping'")
    )
)]
pub async fn connection_details(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
) -> Response {
    let Some(domain) = endpoint
        .strip_suffix("-connection-details")
        .and_then(|raw| raw.parse::<AgentDomain>().ok())
    else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.issuer.issue(domain) {
        Ok(credential) => (
            [(header::CACHE_CONTROL, "no-store")],
            Json(ConnectionDetails::from(credential)),
        )
            .into_response(),
        Err(e) => {
            // Fatal for this session; surface the message verbatim so the
            // operator can see which variable is unresolved.
            error!(%domain, error = %e, "Credential issuance failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Read the current session snapshot for a domain.
#[utoipa::path(
    get,
    path = "/api/{domain}/session",
    responses(
        (status = 200, description = "Current timeline, order, tool status and connection state", body = SessionSnapshot),
        (status = 404, description = "Unknown domain", body = ErrorResponse)
    ),
    params(
        ("domain" = String, Path, description = "Agent domain: 'restaurant' or 'shopping'")
    )
)]
pub async fn session_snapshot(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let domain = parse_domain(&domain)?;
    Ok(Json(state.domain(domain).snapshot()))
}

/// Submit a typed user reply to the domain's text-channel agent.
#[utoipa::path(
    post,
    path = "/api/{domain}/reply",
    request_body = ReplyPayload,
    responses(
        (status = 200, description = "Reply delivered to the agent backend"),
        (status = 404, description = "Unknown domain", body = ErrorResponse),
        (status = 502, description = "Backend rejected or did not receive the reply", body = ErrorResponse)
    ),
    params(
        ("domain" = String, Path, description = "Agent domain: 'restaurant' or 'shopping'")
    )
)]
pub async fn send_reply(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Json(payload): Json<ReplyPayload>,
) -> Result<StatusCode, ApiError> {
    let domain = parse_domain(&domain)?;
    match state.domain(domain).submit_reply(&payload.text).await {
        Ok(()) => Ok(StatusCode::OK),
        // The timeline already carries the synthesized notice; the status
        // code lets the shell re-enable its input without retrying.
        Err(e) => Err(ApiError::BadGateway(e.to_string())),
    }
}

/// Start the domain's realtime voice session.
#[utoipa::path(
    post,
    path = "/api/{domain}/connect",
    responses(
        (status = 200, description = "Realtime session connected", body = ConnectionStateResponse),
        (status = 404, description = "Unknown domain", body = ErrorResponse),
        (status = 409, description = "Already connected", body = ErrorResponse),
        (status = 500, description = "Realtime configuration missing", body = ErrorResponse),
        (status = 502, description = "Provider or device failure", body = ErrorResponse)
    ),
    params(
        ("domain" = String, Path, description = "Agent domain: 'restaurant' or 'shopping'")
    )
)]
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Json<ConnectionStateResponse>, ApiError> {
    let domain = parse_domain(&domain)?;
    let runtime = state.domain(domain);
    let mut manager = runtime.manager().lock().await;
    match manager.connect().await {
        Ok(()) => Ok(Json(ConnectionStateResponse {
            connection: manager.state(),
        })),
        Err(ConnectError::AlreadyConnected) => {
            Err(ApiError::Conflict("Realtime session already connected".to_string()))
        }
        Err(ConnectError::Config(e)) => {
            error!(%domain, error = %e, "Credential issuance failed");
            Err(ApiError::Configuration(e.to_string()))
        }
        Err(e) => Err(ApiError::BadGateway(e.to_string())),
    }
}

/// Stop the domain's realtime voice session. Safe to call when already
/// disconnected.
#[utoipa::path(
    post,
    path = "/api/{domain}/disconnect",
    responses(
        (status = 200, description = "Realtime session disconnected", body = ConnectionStateResponse),
        (status = 404, description = "Unknown domain", body = ErrorResponse)
    ),
    params(
        ("domain" = String, Path, description = "Agent domain: 'restaurant' or 'shopping'")
    )
)]
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Json<ConnectionStateResponse>, ApiError> {
    let domain = parse_domain(&domain)?;
    let runtime = state.domain(domain);
    let mut manager = runtime.manager().lock().await;
    manager.disconnect().await;
    Ok(Json(ConnectionStateResponse {
        connection: manager.state(),
    }))
}
