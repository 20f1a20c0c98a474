use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{JoinSessionMessage, PresenceInfo, ServerEvent};

use super::connctx::{ConnCtx, ConnectionId, ParticipantInfo};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("join-session requires a session id")]
    MissingSessionId,
    #[error("join-session requires a user id")]
    MissingUserId,
    #[error("user id does not match the authenticated user")]
    IdentityMismatch,
    #[error("user {user_id} is not a member of session {session_id}")]
    NotAMember { session_id: String, user_id: String },
    #[error("session membership could not be verified: {0}")]
    MembershipUnavailable(String),
    #[error("connection is not registered")]
    UnknownConnection,
}

impl JoinError {
    /// Code carried by the `error` event sent to the client
    pub fn code(&self) -> &'static str {
        match self {
            JoinError::MissingSessionId | JoinError::MissingUserId => "MISSING_FIELDS",
            JoinError::IdentityMismatch => "IDENTITY_MISMATCH",
            JoinError::NotAMember { .. } => "NOT_A_MEMBER",
            JoinError::MembershipUnavailable(_) => "MEMBERSHIP_UNAVAILABLE",
            JoinError::UnknownConnection => "UNKNOWN_CONNECTION",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("event carries no room id")]
    MissingRoom,
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error("sender is not a member of room {0}")]
    NotAMember(String),
}

/// Validated `join-session` request
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub session_id: String,
    pub participant: ParticipantInfo,
}

impl TryFrom<JoinSessionMessage> for JoinRequest {
    type Error = JoinError;

    fn try_from(msg: JoinSessionMessage) -> Result<Self, Self::Error> {
        let session_id = msg.session_id.ok_or(JoinError::MissingSessionId)?;
        let user_id = msg.user_id.ok_or(JoinError::MissingUserId)?;
        Ok(Self {
            session_id,
            participant: ParticipantInfo {
                user_id,
                user_name: msg.user_name,
                user_role: msg.user_role,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinResult {
    pub participant_count: usize,
    /// The connection was already in this room
    pub rejoined: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    Joined,
    Left,
}

/// Who receives a relayed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every member except the sender
    Others,
    /// Every member including the sender
    Everyone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub connections: usize,
    pub rooms: usize,
    pub participants: usize,
}

#[derive(Default)]
struct Rooms {
    connections: HashMap<ConnectionId, ConnCtx>,
    /// Members per room in join order, unique by connection id
    members: HashMap<String, Vec<ConnectionId>>,
}

impl Rooms {
    fn deliver(&self, room_id: &str, skip: Option<&str>, event: &ServerEvent) -> usize {
        let Some(members) = self.members.get(room_id) else {
            return 0;
        };
        members
            .iter()
            .filter(|id| Some(id.as_str()) != skip)
            .filter_map(|id| self.connections.get(id))
            .filter(|ctx| ctx.send(event.clone()))
            .count()
    }

    fn leave(&mut self, connection_id: &str) -> Option<(String, PresenceInfo)> {
        let ctx = self.connections.get_mut(connection_id)?;
        let room_id = ctx.room_id.take()?;
        let presence = ctx.presence();
        ctx.participant = None;

        if let Some(members) = self.members.get_mut(&room_id) {
            members.retain(|id| id != connection_id);
            if members.is_empty() {
                self.members.remove(&room_id);
                debug!("Room {} is empty and was discarded", room_id);
            }
        }

        let presence = presence?;
        self.deliver(&room_id, None, &ServerEvent::UserLeft(presence.clone()));
        info!("Connection {} left session {}", connection_id, room_id);
        Some((room_id, presence))
    }
}

/// Owns the membership of every live session room.
///
/// All operations are synchronous and never hold the lock across an await
/// point. Events are queued on each member's ordered outbound channel, so the
/// order in which one sender's events are relayed is the order every
/// recipient observes.
#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<Rooms>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Rooms> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly upgraded connection. It is not in any room yet.
    pub fn connect(&self, ctx: ConnCtx) {
        debug!("Registering connection {}", ctx.id);
        self.lock().connections.insert(ctx.id.clone(), ctx);
    }

    /// Leave the current room (notifying the others) and forget the connection
    pub fn disconnect(&self, connection_id: &str) -> Option<PresenceInfo> {
        let mut rooms = self.lock();
        let left = rooms.leave(connection_id).map(|(_, presence)| presence);
        rooms.connections.remove(connection_id);
        info!("Connection {} disconnected", connection_id);
        left
    }

    /// Add the connection to `request.session_id`, creating the room when
    /// needed. A connection is in at most one room: joining another room
    /// leaves the previous one first. Joining the same room again keeps the
    /// membership unchanged but announces the participant again.
    pub fn join(&self, connection_id: &str, request: JoinRequest) -> Result<JoinResult, JoinError> {
        let mut rooms = self.lock();
        let ctx = rooms
            .connections
            .get(connection_id)
            .ok_or(JoinError::UnknownConnection)?;

        if let Some(authenticated) = &ctx.authenticated_user {
            if authenticated != &request.participant.user_id {
                return Err(JoinError::IdentityMismatch);
            }
        }

        let rejoined = ctx.room_id.as_deref() == Some(request.session_id.as_str());
        if !rejoined {
            rooms.leave(connection_id);
        }

        let presence = {
            let ctx = rooms
                .connections
                .get_mut(connection_id)
                .ok_or(JoinError::UnknownConnection)?;
            ctx.participant = Some(request.participant);
            ctx.room_id = Some(request.session_id.clone());
            ctx.presence()
        };

        let members = rooms.members.entry(request.session_id.clone()).or_default();
        if !members.iter().any(|id| id == connection_id) {
            members.push(connection_id.to_string());
        }
        let participant_count = members.len();

        if let Some(presence) = presence {
            rooms.deliver(
                &request.session_id,
                Some(connection_id),
                &ServerEvent::UserJoined(presence),
            );
        }

        info!(
            "Connection {} joined session {} ({} participants{})",
            connection_id,
            request.session_id,
            participant_count,
            if rejoined { ", rejoin" } else { "" }
        );

        Ok(JoinResult { participant_count, rejoined })
    }

    /// Leave whatever room the connection is in. No-op when it is in none.
    pub fn leave(&self, connection_id: &str) -> Option<PresenceInfo> {
        self.lock().leave(connection_id).map(|(_, presence)| presence)
    }

    /// Notify every member of `room_id` except the subject of the event
    pub fn broadcast_presence(&self, room_id: &str, event: PresenceEvent, info: PresenceInfo) -> usize {
        let skip = info.socket_id.clone();
        let event = match event {
            PresenceEvent::Joined => ServerEvent::UserJoined(info),
            PresenceEvent::Left => ServerEvent::UserLeft(info),
        };
        self.lock().deliver(room_id, Some(&skip), &event)
    }

    /// Send an event to one connection only
    pub fn send_to(&self, connection_id: &str, event: ServerEvent) -> bool {
        self.lock()
            .connections
            .get(connection_id)
            .is_some_and(|ctx| ctx.send(event))
    }

    /// Relay an event built from the sender's registered identity to the
    /// room. Senders that are not members of `room_id` are refused and
    /// nothing is delivered.
    pub fn relay<F>(
        &self,
        sender_id: &str,
        room_id: Option<&str>,
        delivery: Delivery,
        build: F,
    ) -> Result<usize, RelayError>
    where
        F: FnOnce(&ParticipantInfo) -> ServerEvent,
    {
        let room_id = room_id.ok_or(RelayError::MissingRoom)?;
        let rooms = self.lock();
        let ctx = rooms
            .connections
            .get(sender_id)
            .ok_or_else(|| RelayError::UnknownConnection(sender_id.to_string()))?;

        let participant = match (&ctx.room_id, &ctx.participant) {
            (Some(current), Some(participant)) if current == room_id => participant,
            _ => return Err(RelayError::NotAMember(room_id.to_string())),
        };

        let event = build(participant);
        let skip = match delivery {
            Delivery::Others => Some(sender_id),
            Delivery::Everyone => None,
        };
        Ok(rooms.deliver(room_id, skip, &event))
    }

    /// Room and identity of a connection that has joined
    pub fn participant(&self, connection_id: &str) -> Option<(String, ParticipantInfo)> {
        let rooms = self.lock();
        let ctx = rooms.connections.get(connection_id)?;
        Some((ctx.room_id.clone()?, ctx.participant.clone()?))
    }

    pub fn participants(&self, room_id: &str) -> Vec<PresenceInfo> {
        let rooms = self.lock();
        rooms
            .members
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| rooms.connections.get(id))
                    .filter_map(ConnCtx::presence)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.lock().members.get(room_id).map_or(0, Vec::len)
    }

    pub fn has_room(&self, room_id: &str) -> bool {
        self.lock().members.contains_key(room_id)
    }

    pub fn stats(&self) -> RegistryStats {
        let rooms = self.lock();
        RegistryStats {
            connections: rooms.connections.len(),
            rooms: rooms.members.len(),
            participants: rooms.members.values().map(Vec::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, SessionInfo};
    use tokio::sync::mpsc::{channel, Receiver};

    fn connect(registry: &RoomRegistry, id: &str) -> Receiver<ServerEvent> {
        let (tx, rx) = channel(64);
        registry.connect(ConnCtx::new(id.to_string(), tx, None));
        rx
    }

    fn request(session: &str, user: &str) -> JoinRequest {
        JoinRequest {
            session_id: session.to_string(),
            participant: ParticipantInfo {
                user_id: user.to_string(),
                user_name: Some(format!("name-{user}")),
                user_role: Some(Role::Student),
            },
        }
    }

    fn drain(rx: &mut Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn join_creates_room_and_counts_members() {
        let registry = RoomRegistry::new();
        let mut a = connect(&registry, "a");
        let _b = connect(&registry, "b");

        let first = registry.join("a", request("S1", "ua")).unwrap();
        assert_eq!(first, JoinResult { participant_count: 1, rejoined: false });

        let second = registry.join("b", request("S1", "ub")).unwrap();
        assert_eq!(second.participant_count, 2);

        let events = drain(&mut a);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::UserJoined(p) => {
                assert_eq!(p.user_id, "ub");
                assert_eq!(p.socket_id, "b");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejoin_same_room_keeps_size_but_rebroadcasts() {
        let registry = RoomRegistry::new();
        let mut a = connect(&registry, "a");
        let _b = connect(&registry, "b");
        registry.join("a", request("S1", "ua")).unwrap();
        registry.join("b", request("S1", "ub")).unwrap();
        drain(&mut a);

        let again = registry.join("b", request("S1", "ub")).unwrap();
        assert_eq!(again, JoinResult { participant_count: 2, rejoined: true });
        assert_eq!(registry.member_count("S1"), 2);

        let events = drain(&mut a);
        assert!(matches!(events.as_slice(), [ServerEvent::UserJoined(p)] if p.user_id == "ub"));
    }

    #[test]
    fn joining_another_room_leaves_the_first() {
        let registry = RoomRegistry::new();
        let mut a = connect(&registry, "a");
        let _b = connect(&registry, "b");
        registry.join("a", request("S1", "ua")).unwrap();
        registry.join("b", request("S1", "ub")).unwrap();
        drain(&mut a);

        registry.join("b", request("S2", "ub")).unwrap();
        assert_eq!(registry.member_count("S1"), 1);
        assert_eq!(registry.member_count("S2"), 1);
        assert!(matches!(drain(&mut a).as_slice(), [ServerEvent::UserLeft(p)] if p.socket_id == "b"));
    }

    #[test]
    fn missing_identity_is_rejected_without_mutation() {
        let registry = RoomRegistry::new();
        let _a = connect(&registry, "a");

        let no_session = JoinSessionMessage { user_id: Some("ua".into()), ..Default::default() };
        assert_eq!(JoinRequest::try_from(no_session), Err(JoinError::MissingSessionId));
        let no_user = JoinSessionMessage { session_id: Some("S1".into()), ..Default::default() };
        assert_eq!(JoinRequest::try_from(no_user), Err(JoinError::MissingUserId));

        assert_eq!(registry.stats().rooms, 0);
        assert!(registry.participant("a").is_none());
    }

    #[test]
    fn authenticated_connection_cannot_claim_another_user() {
        let registry = RoomRegistry::new();
        let (tx, _rx) = channel(64);
        registry.connect(ConnCtx::new("a".into(), tx, Some("ua".into())));

        assert_eq!(registry.join("a", request("S1", "someone-else")), Err(JoinError::IdentityMismatch));
        assert!(!registry.has_room("S1"));
        assert!(registry.join("a", request("S1", "ua")).is_ok());
    }

    #[test]
    fn disconnect_notifies_remaining_and_discards_empty_room() {
        let registry = RoomRegistry::new();
        let _a = connect(&registry, "a");
        let mut b = connect(&registry, "b");
        registry.join("a", request("S1", "ua")).unwrap();
        registry.join("b", request("S1", "ub")).unwrap();
        drain(&mut b);

        let left = registry.disconnect("a").unwrap();
        assert_eq!(left.user_id, "ua");
        assert_eq!(registry.member_count("S1"), 1);
        assert!(matches!(drain(&mut b).as_slice(), [ServerEvent::UserLeft(p)] if p.user_id == "ua"));

        registry.disconnect("b");
        assert!(!registry.has_room("S1"));
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn leave_without_room_is_a_no_op() {
        let registry = RoomRegistry::new();
        let _a = connect(&registry, "a");
        assert!(registry.leave("a").is_none());
        assert!(registry.leave("nobody").is_none());
    }

    #[test]
    fn relay_excludes_sender_and_other_rooms() {
        let registry = RoomRegistry::new();
        let mut a = connect(&registry, "a");
        let mut b = connect(&registry, "b");
        let mut c = connect(&registry, "c");
        registry.join("a", request("S1", "ua")).unwrap();
        registry.join("b", request("S1", "ub")).unwrap();
        registry.join("c", request("S2", "uc")).unwrap();
        drain(&mut a);
        drain(&mut b);
        drain(&mut c);

        let info = |p: &ParticipantInfo| {
            ServerEvent::SessionInfo(SessionInfo { session_id: p.user_id.clone(), num_participants: 0 })
        };
        assert_eq!(registry.relay("a", Some("S1"), Delivery::Others, info), Ok(1));
        assert!(drain(&mut a).is_empty());
        assert_eq!(drain(&mut b).len(), 1);
        assert!(drain(&mut c).is_empty());

        assert_eq!(registry.relay("a", Some("S1"), Delivery::Everyone, info), Ok(2));
        assert_eq!(drain(&mut a).len(), 1);
    }

    #[test]
    fn relay_from_non_member_is_refused() {
        let registry = RoomRegistry::new();
        let _a = connect(&registry, "a");
        let mut b = connect(&registry, "b");
        registry.join("b", request("S1", "ub")).unwrap();

        let info = |_: &ParticipantInfo| {
            ServerEvent::SessionInfo(SessionInfo { session_id: "x".into(), num_participants: 0 })
        };
        assert_eq!(
            registry.relay("a", Some("S1"), Delivery::Others, info),
            Err(RelayError::NotAMember("S1".into()))
        );
        assert_eq!(registry.relay("a", None, Delivery::Others, info), Err(RelayError::MissingRoom));
        assert!(drain(&mut b).is_empty());
    }

    #[test]
    fn participants_lists_presence_in_join_order() {
        let registry = RoomRegistry::new();
        let _a = connect(&registry, "a");
        let _b = connect(&registry, "b");
        registry.join("b", request("S1", "ub")).unwrap();
        registry.join("a", request("S1", "ua")).unwrap();

        let users: Vec<_> = registry.participants("S1").into_iter().map(|p| p.user_id).collect();
        assert_eq!(users, vec!["ub", "ua"]);
        assert!(registry.participants("nope").is_empty());
    }
}
