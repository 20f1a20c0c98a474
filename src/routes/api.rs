use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{diagnostics, health_check, issue_ticket, ready_check, session_participants};
use crate::routes::auth_middleware::auth_middleware;
use crate::AppState;

/// Create API routes
pub fn create_api_routes(state: AppState) -> Router<AppState> {
    Router::<AppState>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/sessions/:session_id/participants", get(session_participants))
        .route("/v1/tickets", post(issue_ticket))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware)) // Applies to all routes added above
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
}
