use chrono::{Duration, Utc};
use futures_util::future::BoxFuture;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::Config;
use crate::models::{AppendMessageRequest, ChatMessage};
use crate::services::session_store::{SessionStore, StoreError};

/// REST client for the app service that owns users, sessions and messages
#[derive(Debug)]
pub struct AppServiceClient {
    client: Client,
    base_url: String,
    jwt_secret: Option<String>,
    service_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    type_: String,
    exp: usize,
}

impl AppServiceClient {
    pub fn new(
        base_url: String,
        jwt_secret: Option<String>,
        service_name: String,
        timeout: std::time::Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt_secret,
            service_name,
        })
    }

    /// Build a client from the configuration, `None` when no URL is set
    pub fn from_config(config: &Config) -> Result<Option<Self>, StoreError> {
        let Some(base_url) = config.app_service_url.clone() else {
            return Ok(None);
        };
        Self::new(
            base_url,
            config.auth_jwt_secret.clone(),
            config.service_name.clone(),
            config.app_service_timeout(),
        )
        .map(Some)
    }

    fn generate_token(&self) -> Option<String> {
        let secret = self.jwt_secret.as_ref()?;
        let expiration = (Utc::now() + Duration::seconds(60)).timestamp();

        let claims = Claims {
            sub: self.service_name.clone(),
            type_: "service".to_string(),
            exp: expiration as usize,
        };

        match encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())) {
            Ok(token) => Some(token),
            Err(e) => {
                error!("Failed to generate service token: {}", e);
                None
            }
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.generate_token() {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    pub fn messages_url(&self, session_id: &str) -> String {
        format!("{}/api/sessions/{}/messages", self.base_url, session_id)
    }

    pub fn member_url(&self, session_id: &str, user_id: &str) -> String {
        format!("{}/api/sessions/{}/members/{}", self.base_url, session_id, user_id)
    }
}

impl SessionStore for AppServiceClient {
    fn append_message<'a>(&'a self, message: &'a ChatMessage) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let session_id = message.session_id.as_deref().ok_or(StoreError::Incomplete("sessionId"))?;
            let sender_id = message.sender_id.clone().ok_or(StoreError::Incomplete("senderId"))?;
            let body = AppendMessageRequest {
                sender_id,
                content: message.content.clone(),
                timestamp: message.timestamp.unwrap_or_else(Utc::now),
            };

            let response = self
                .authorized(self.client.post(self.messages_url(session_id)))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(StoreError::Status { status: status.as_u16(), body });
            }
            debug!("Persisted chat message for session {}", session_id);
            Ok(())
        })
    }

    fn is_session_member<'a>(
        &'a self,
        session_id: &'a str,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let response = self
                .authorized(self.client.get(self.member_url(session_id, user_id)))
                .send()
                .await?;

            match response.status() {
                status if status.is_success() => Ok(true),
                StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(false),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(StoreError::Status { status: status.as_u16(), body })
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let client = AppServiceClient::new(
            "http://app.test/".to_string(),
            None,
            "tutorconnect-live".to_string(),
            std::time::Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.messages_url("12"), "http://app.test/api/sessions/12/messages");
        assert_eq!(client.member_url("12", "7"), "http://app.test/api/sessions/12/members/7");
        assert!(client.generate_token().is_none());
    }

    #[test]
    fn service_token_carries_service_claims() {
        let client = AppServiceClient::new(
            "http://app.test".to_string(),
            Some("secret".to_string()),
            "tutorconnect-live".to_string(),
            std::time::Duration::from_secs(1),
        )
        .unwrap();
        let token = client.generate_token().unwrap();
        let data = crate::services::auth_service::validate_jwt(&token, "secret").unwrap();
        assert_eq!(data.claims["sub"], "tutorconnect-live");
        assert_eq!(data.claims["type"], "service");
    }

    #[test]
    fn from_config_without_url_is_none() {
        assert!(AppServiceClient::from_config(&Config::default()).unwrap().is_none());
    }
}
