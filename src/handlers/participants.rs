use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::models::{ApiError, ErrorResponse, ParticipantsResponse};
use crate::AppState;

/// Current presence of a session room. An unknown or empty room answers 404.
pub async fn session_participants(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<(StatusCode, Json<ParticipantsResponse>), ApiError> {
    let participants = state.registry.participants(&session_id);
    if participants.is_empty() {
        return Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            format!("No live room for session {}", session_id),
        ));
    }

    debug!("Session {} has {} participants", session_id, participants.len());
    Ok((
        StatusCode::OK,
        Json(ParticipantsResponse { session_id, participants }),
    ))
}
