use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::models::{PresenceInfo, Role, ServerEvent};

use super::registry::RoomRegistry;

pub type ConnectionId = String;

/// Identity a participant announced in `join-session`
#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantInfo {
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_role: Option<Role>,
}

/// Per-connection context held by the room registry
#[derive(Debug)]
pub struct ConnCtx {
    pub id: ConnectionId,
    /// User id proven at upgrade time, `None` when authentication is disabled
    pub authenticated_user: Option<String>,
    pub participant: Option<ParticipantInfo>,
    pub room_id: Option<String>,
    sender: Sender<ServerEvent>,
    overflow: Arc<Notify>,
}

impl ConnCtx {
    pub fn new(
        id: ConnectionId,
        sender: Sender<ServerEvent>,
        authenticated_user: Option<String>,
    ) -> Self {
        Self {
            id,
            authenticated_user,
            participant: None,
            room_id: None,
            sender,
            overflow: Arc::new(Notify::new()),
        }
    }

    /// Queue an event on the connection's ordered outbound stream.
    ///
    /// The queue is bounded. When a client stops reading and the queue fills
    /// up, the event is dropped and the overflow signal fires so the socket
    /// task can close the connection.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Outbound queue of {} is full, dropping {} and closing the connection",
                    self.id,
                    event.name()
                );
                self.overflow.notify_one();
                false
            }
            Err(TrySendError::Closed(event)) => {
                debug!("Connection {} is gone, dropping {}", self.id, event.name());
                false
            }
        }
    }

    /// Fires once the outbound queue has overflowed
    pub fn overflow_signal(&self) -> Arc<Notify> {
        self.overflow.clone()
    }

    pub fn presence(&self) -> Option<PresenceInfo> {
        self.participant.as_ref().map(|p| PresenceInfo {
            user_id: p.user_id.clone(),
            user_name: p.user_name.clone(),
            user_role: p.user_role,
            socket_id: self.id.clone(),
        })
    }
}

/// Removes the connection from the registry when the socket task ends,
/// whichever way it ends.
pub struct ConnectionGuard {
    registry: Arc<RoomRegistry>,
    connection_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn new(registry: Arc<RoomRegistry>, connection_id: ConnectionId) -> Self {
        Self { registry, connection_id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.disconnect(&self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorEvent;
    use std::time::Duration;
    use tokio::sync::mpsc::channel;

    fn event(n: usize) -> ServerEvent {
        ServerEvent::Error(ErrorEvent { code: "TEST".into(), message: n.to_string() })
    }

    #[tokio::test]
    async fn full_queue_drops_and_signals_overflow() {
        let (tx, mut rx) = channel(2);
        let ctx = ConnCtx::new("a".into(), tx, None);
        let overflow = ctx.overflow_signal();

        assert!(ctx.send(event(1)));
        assert!(ctx.send(event(2)));
        assert!(tokio::time::timeout(Duration::from_millis(20), overflow.notified()).await.is_err());

        assert!(!ctx.send(event(3)));
        assert!(tokio::time::timeout(Duration::from_millis(20), overflow.notified()).await.is_ok());

        // Events already queued keep their order, the overflowing one is gone
        assert_eq!(rx.recv().await, Some(event(1)));
        assert_eq!(rx.recv().await, Some(event(2)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_not_an_overflow() {
        let (tx, rx) = channel(1);
        let ctx = ConnCtx::new("a".into(), tx, None);
        drop(rx);

        assert!(!ctx.send(event(1)));
        let overflow = ctx.overflow_signal();
        assert!(tokio::time::timeout(Duration::from_millis(20), overflow.notified()).await.is_err());
    }
}
