use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::opt_id;
use super::presence::Role;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

/// `offer` sent by a peer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfferMessage {
    #[serde(default, deserialize_with = "opt_id")]
    pub room_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<String>,
    pub offer: Value,
}

/// `answer` sent by a peer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerMessage {
    #[serde(default, deserialize_with = "opt_id")]
    pub room_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<String>,
    pub answer: Value,
}

/// `ice-candidate` sent by a peer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateMessage {
    #[serde(default, deserialize_with = "opt_id")]
    pub room_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<String>,
    pub candidate: Value,
}

/// Signaling message with the payload kept opaque
#[derive(Debug, Clone, PartialEq)]
pub struct SignalingMessage {
    pub kind: SignalKind,
    pub room_id: Option<String>,
    pub payload: Value,
}

impl From<OfferMessage> for SignalingMessage {
    fn from(msg: OfferMessage) -> Self {
        Self { kind: SignalKind::Offer, room_id: msg.room_id, payload: msg.offer }
    }
}

impl From<AnswerMessage> for SignalingMessage {
    fn from(msg: AnswerMessage) -> Self {
        Self { kind: SignalKind::Answer, room_id: msg.room_id, payload: msg.answer }
    }
}

impl From<IceCandidateMessage> for SignalingMessage {
    fn from(msg: IceCandidateMessage) -> Self {
        Self { kind: SignalKind::IceCandidate, room_id: msg.room_id, payload: msg.candidate }
    }
}

/// `offer` as delivered to the other members
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayedOffer {
    pub offer: Value,
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_role: Option<Role>,
}

/// `answer` as delivered to the other members
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayedAnswer {
    pub answer: Value,
    pub user_id: String,
}

/// `ice-candidate` as delivered to the other members
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayedIceCandidate {
    pub candidate: Value,
    pub user_id: String,
}
