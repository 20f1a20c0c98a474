use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::models::{ApiError, TicketResponse};
use crate::routes::auth_middleware::AuthenticatedUser;
use crate::AppState;

/// Issue a one-time websocket ticket for the authenticated caller
pub async fn issue_ticket(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let (ticket, expires_at) = state.tickets.issue(&user.0, Utc::now());
    info!("Issued websocket ticket for {} (expires {})", user.0, expires_at);
    Ok((StatusCode::CREATED, Json(TicketResponse { ticket, expires_at })))
}
