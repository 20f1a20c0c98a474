use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{error, info};

use crate::services::auth_service::{get_auth_token, user_id_from_token};
use crate::AppState;

/// User id proven by the request's token, available to handlers behind
/// [`auth_middleware`] as an `Extension`.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedUser(pub String);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Get the auth token from the header or cookie
    let token = match get_auth_token(req.headers()) {
        Ok(token) => token,
        Err(_) => return Err(StatusCode::UNAUTHORIZED),
    };

    // 2. Validate it
    let secret = match state.config.auth_jwt_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => secret,
        None => {
            error!("Auth JWT secret not configured");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let user_id = match user_id_from_token(&token, secret) {
        Ok(user_id) => user_id,
        Err(e) => {
            error!("JWT validation failed: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    info!("Token validated for user {}", user_id);

    // 3. Hand the user to downstream handlers
    req.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(req).await)
}
