use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use thiserror::Error;
use tracing::debug;

/// Cookie carrying the access token when no Authorization header is sent
pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header or auth_token cookie")]
    MissingToken,
    #[error("invalid {0} header")]
    InvalidHeader(&'static str),
    #[error("token validation failed: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token does not contain a '{0}' claim")]
    MissingClaim(&'static str),
}

// Get the auth token from the request headers
pub fn get_auth_token(headers: &HeaderMap) -> Result<String, AuthError> {
    // 1. Try the Authorization header
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidHeader("Authorization"))?;
        return Ok(auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).to_string());
    }

    // 2. Fall back to the auth cookie
    let cookie_header = headers
        .get(header::COOKIE)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Cookie"))?;

    cookie::Cookie::split_parse(cookie_header)
        .flatten()
        .find(|c| c.name() == AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AuthError::MissingToken)
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

/// Validate the token and extract the user id it was issued to.
///
/// The app service signs user ids either as a string or as a number (`id` of
/// the users table), under `sub` or `id`.
pub fn user_id_from_token(token: &str, secret: &str) -> Result<String, AuthError> {
    let data = validate_jwt(token, secret)?;
    let claim = data
        .claims
        .get("sub")
        .or_else(|| data.claims.get("id"))
        .ok_or(AuthError::MissingClaim("sub"))?;

    let user_id = match claim {
        serde_json::Value::String(s) if !s.is_empty() => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(AuthError::MissingClaim("sub")),
    };
    debug!("Token validated for user {}", user_id);
    Ok(user_id)
}

/// Authenticate request headers against `secret`
pub fn authenticate_headers(headers: &HeaderMap, secret: &str) -> Result<String, AuthError> {
    let token = get_auth_token(headers)?;
    user_id_from_token(&token, secret)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub(crate) fn token_for(user: serde_json::Value, secret: &str) -> String {
        let exp = (chrono::Utc::now() + chrono::Duration::minutes(15)).timestamp();
        encode(
            &Header::default(),
            &json!({ "sub": user, "type": "user", "exp": exp }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("auth_token=def"));
        assert_eq!(get_auth_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn cookie_is_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; auth_token=def"));
        assert_eq!(get_auth_token(&headers).unwrap(), "def");

        let empty = HeaderMap::new();
        assert!(matches!(get_auth_token(&empty), Err(AuthError::MissingToken)));
    }

    #[test]
    fn numeric_subject_becomes_user_id() {
        let token = token_for(json!(42), "secret");
        assert_eq!(user_id_from_token(&token, "secret").unwrap(), "42");
        assert!(matches!(user_id_from_token(&token, "other"), Err(AuthError::Invalid(_))));
    }
}
