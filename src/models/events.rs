use serde::{Deserialize, Serialize};

use super::chat::ChatMessage;
use super::draw::DrawMessage;
use super::presence::{
    ErrorEvent, JoinSessionMessage, PresenceInfo, RecordingNotice, RecordingPresence, SessionInfo,
};
use super::signaling::{
    AnswerMessage, IceCandidateMessage, OfferMessage, RelayedAnswer, RelayedIceCandidate,
    RelayedOffer,
};

/// Every frame a client may send: `{"event": "<name>", "data": {...}}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinSession(JoinSessionMessage),
    Draw(DrawMessage),
    Message(ChatMessage),
    Offer(OfferMessage),
    Answer(AnswerMessage),
    IceCandidate(IceCandidateMessage),
    StartRecording(RecordingNotice),
    StopRecording(RecordingNotice),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinSession(_) => "join-session",
            ClientEvent::Draw(_) => "draw",
            ClientEvent::Message(_) => "message",
            ClientEvent::Offer(_) => "offer",
            ClientEvent::Answer(_) => "answer",
            ClientEvent::IceCandidate(_) => "ice-candidate",
            ClientEvent::StartRecording(_) => "start-recording",
            ClientEvent::StopRecording(_) => "stop-recording",
        }
    }
}

/// Every frame the relay may send
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    SessionInfo(SessionInfo),
    UserJoined(PresenceInfo),
    UserLeft(PresenceInfo),
    Draw(DrawMessage),
    Message(ChatMessage),
    Offer(RelayedOffer),
    Answer(RelayedAnswer),
    IceCandidate(RelayedIceCandidate),
    RecordingStarted(RecordingPresence),
    RecordingStopped(RecordingPresence),
    Error(ErrorEvent),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::SessionInfo(_) => "session-info",
            ServerEvent::UserJoined(_) => "user-joined",
            ServerEvent::UserLeft(_) => "user-left",
            ServerEvent::Draw(_) => "draw",
            ServerEvent::Message(_) => "message",
            ServerEvent::Offer(_) => "offer",
            ServerEvent::Answer(_) => "answer",
            ServerEvent::IceCandidate(_) => "ice-candidate",
            ServerEvent::RecordingStarted(_) => "recording-started",
            ServerEvent::RecordingStopped(_) => "recording-stopped",
            ServerEvent::Error(_) => "error",
        }
    }
}
