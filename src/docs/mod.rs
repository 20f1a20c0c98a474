use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Relay and process diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    tag = "live",
    security(("bearer" = []), ("cookie" = [])),
    responses(
        (status = 200, description = "Current diagnostics", body = DiagnosticsResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Participants currently present in a session room
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}/participants",
    tag = "live",
    params(
        ("session_id" = String, Path, description = "Tutoring session id")
    ),
    security(("bearer" = []), ("cookie" = [])),
    responses(
        (status = 200, description = "Room presence", body = ParticipantsResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No live room for this session", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_participants_doc() {}

/// Issue a one-time ticket for `GET /ws?ticket=...`
#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    tag = "live",
    security(("bearer" = []), ("cookie" = [])),
    responses(
        (status = 201, description = "Ticket issued", body = TicketResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[allow(dead_code)]
pub async fn issue_ticket_doc() {}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
            components.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("auth_token"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        session_participants_doc,
        issue_ticket_doc,
    ),
    components(
        schemas(
            HealthResponse,
            DiagnosticsResponse,
            ParticipantsResponse,
            PresenceInfo,
            Role,
            TicketResponse,
            ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "live", description = "Live session relay")
    )
)]
pub struct ApiDoc;
