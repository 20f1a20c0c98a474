use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::services::session_store::{SessionStore, StoreError};

/// Cached answers to "is this user part of this tutoring session".
///
/// Only positive answers are cached so a user added to a session after a
/// refused join can retry right away.
#[derive(Clone)]
pub struct MembershipCache {
    cache: Cache<(String, String), bool>,
    store: Arc<dyn SessionStore>,
}

impl MembershipCache {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(ttl)
            .build();
        info!("Membership cache initialized");
        Self { cache, store }
    }

    pub async fn is_member(&self, session_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let key = (session_id.to_string(), user_id.to_string());
        if self.cache.get(&key).await.is_some() {
            return Ok(true);
        }

        info!("Membership cache miss for user {} in session {}", user_id, session_id);
        let member = self
            .store
            .is_session_member(session_id, user_id)
            .await
            .map_err(|e| {
                error!("Failed to verify membership of {} in {}: {}", user_id, session_id, e);
                e
            })?;

        if member {
            self.cache.insert(key, true).await;
        }
        Ok(member)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        members: Vec<(&'static str, &'static str)>,
    }

    impl SessionStore for CountingStore {
        fn append_message<'a>(&'a self, _message: &'a ChatMessage) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async { Ok(()) })
        }

        fn is_session_member<'a>(
            &'a self,
            session_id: &'a str,
            user_id: &'a str,
        ) -> BoxFuture<'a, Result<bool, StoreError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let member = self.members.iter().any(|(s, u)| *s == session_id && *u == user_id);
            Box::pin(async move { Ok(member) })
        }
    }

    #[tokio::test]
    async fn positive_answers_are_cached() {
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0), members: vec![("S1", "u1")] });
        let cache = MembershipCache::new(store.clone(), Duration::from_secs(60));

        assert!(cache.is_member("S1", "u1").await.unwrap());
        assert!(cache.is_member("S1", "u1").await.unwrap());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        assert!(!cache.is_member("S1", "u2").await.unwrap());
        assert!(!cache.is_member("S1", "u2").await.unwrap());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }
}
