use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::debug;

use crate::models::ChatMessage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to the app service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("app service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("chat message is missing {0}")]
    Incomplete(&'static str),
    #[error("{0}")]
    Unavailable(String),
}

/// The app service owning sessions and chat history, as seen by the relay.
/// Used only to append chat messages and to check session membership.
pub trait SessionStore: Send + Sync {
    fn append_message<'a>(&'a self, message: &'a ChatMessage) -> BoxFuture<'a, Result<(), StoreError>>;

    fn is_session_member<'a>(
        &'a self,
        session_id: &'a str,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>>;
}

/// Store used when no app service is configured: nothing is persisted and
/// every user is considered a member.
#[derive(Debug, Default, Clone)]
pub struct NoopSessionStore;

impl SessionStore for NoopSessionStore {
    fn append_message<'a>(&'a self, message: &'a ChatMessage) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            debug!(
                "No app service configured, chat message for session {:?} is not persisted",
                message.session_id
            );
            Ok(())
        })
    }

    fn is_session_member<'a>(
        &'a self,
        _session_id: &'a str,
        _user_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async { Ok(true) })
    }
}
