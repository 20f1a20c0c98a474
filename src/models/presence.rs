use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::opt_id;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tutor,
    Student,
}

/// `join-session` payload
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionMessage {
    #[serde(default, deserialize_with = "opt_id")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_role: Option<Role>,
}

/// `session-info` sent back to a joining client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub num_participants: usize,
}

/// `user-joined` / `user-left` payload, also returned by the participants endpoint
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceInfo {
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_role: Option<Role>,
    pub socket_id: String,
}

/// `start-recording` / `stop-recording` payload
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingNotice {
    #[serde(default, deserialize_with = "opt_id")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// `recording-started` / `recording-stopped` payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPresence {
    pub user_id: String,
    pub user_name: Option<String>,
}

/// `error` event sent to a single connection
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
}
