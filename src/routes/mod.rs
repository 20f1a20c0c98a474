pub mod api;
pub mod auth_middleware;

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::docs::ApiDoc;
use crate::websocket::handler::websocket_handler;
use crate::AppState;

pub use api::create_api_routes;

/// The whole HTTP surface: websocket upgrade, REST API and Swagger UI
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        // Live session websocket
        .route("/ws", get(websocket_handler))
        // Mount API routes
        .nest("/api", create_api_routes(state.clone()))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config.allowed_origins() {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin {}", o);
                        None
                    }
                })
                .collect();
            layer.allow_origin(origins)
        }
        None => layer.allow_origin(Any),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth_service::tests::token_for;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn secured_state() -> AppState {
        AppState::new(Config {
            auth_jwt_secret: Some("secret".into()),
            ..Config::default()
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let response = app(secured_state())
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let response = app(secured_state())
            .oneshot(Request::post("/api/v1/tickets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ticket_is_issued_to_the_caller() {
        let state = secured_state();
        let token = token_for(json!("u1"), "secret");
        let response = app(state.clone())
            .oneshot(
                Request::post("/api/v1/tickets")
                    .header(header::COOKIE, format!("auth_token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        let ticket = body["ticket"].as_str().unwrap();
        assert_eq!(state.tickets.redeem(ticket, chrono::Utc::now()), Ok("u1".to_string()));
    }

    #[tokio::test]
    async fn participants_of_unknown_room_is_not_found() {
        let token = token_for(json!("u1"), "secret");
        let response = app(secured_state())
            .oneshot(
                Request::get("/api/v1/sessions/S9/participants")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], 404);
    }
}
