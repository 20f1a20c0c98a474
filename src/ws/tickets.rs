use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("unknown ticket")]
    Unknown,
    #[error("ticket expired")]
    Expired,
}

#[derive(Debug, Clone)]
struct Ticket {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Short-lived, single-use tickets that let a browser open the websocket
/// without sending an Authorization header.
///
/// Created once at startup and shared through `AppState`. Expired entries are
/// removed by [`TicketStore::sweep`], driven by [`spawn_sweeper`].
pub struct TicketStore {
    ttl: ChronoDuration,
    tickets: Mutex<HashMap<String, Ticket>>,
}

impl TicketStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(60)),
            tickets: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Ticket>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a ticket bound to `user_id`
    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let ticket = Uuid::new_v4().simple().to_string();
        let expires_at = now + self.ttl;
        self.lock().insert(
            ticket.clone(),
            Ticket { user_id: user_id.to_string(), expires_at },
        );
        debug!("Issued websocket ticket for user {}", user_id);
        (ticket, expires_at)
    }

    /// Consume a ticket and return the user it was issued to
    pub fn redeem(&self, ticket: &str, now: DateTime<Utc>) -> Result<String, TicketError> {
        let entry = self.lock().remove(ticket).ok_or(TicketError::Unknown)?;
        if entry.expires_at <= now {
            return Err(TicketError::Expired);
        }
        Ok(entry.user_id)
    }

    /// Drop every expired ticket, returning how many were removed
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut tickets = self.lock();
        let before = tickets.len();
        tickets.retain(|_, t| t.expires_at > now);
        before - tickets.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically sweep expired tickets until the returned task is aborted
pub fn spawn_sweeper(store: Arc<TicketStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = store.sweep(Utc::now());
            if removed > 0 {
                info!("Swept {} expired websocket tickets", removed);
            }
        }
    })
}
