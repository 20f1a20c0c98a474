use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PresenceInfo;

/// Current presence in a session room
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsResponse {
    pub session_id: String,
    pub participants: Vec<PresenceInfo>,
}
