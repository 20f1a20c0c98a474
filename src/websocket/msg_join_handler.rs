use tracing::{info, warn};

use crate::models::{ErrorEvent, JoinSessionMessage, ServerEvent, SessionInfo};
use crate::ws::registry::{JoinError, JoinRequest, JoinResult};
use crate::AppState;

/// Handle `join-session`: validate, authorize, join and answer with
/// `session-info`. A rejected join leaves the registry untouched and sends an
/// `error` event to this connection only.
pub async fn handle_join_message(
    state: &AppState,
    connection_id: &str,
    join_msg: JoinSessionMessage,
) -> Result<JoinResult, JoinError> {
    info!(
        "Join request from {}: session={:?}, user={:?}",
        connection_id, join_msg.session_id, join_msg.user_id
    );

    let request = match JoinRequest::try_from(join_msg) {
        Ok(request) => request,
        Err(e) => return reject(state, connection_id, e),
    };
    let session_id = request.session_id.clone();

    if state.config.require_membership {
        let user_id = &request.participant.user_id;
        match state.membership.is_member(&session_id, user_id).await {
            Ok(true) => {}
            Ok(false) => {
                let e = JoinError::NotAMember { session_id, user_id: user_id.clone() };
                return reject(state, connection_id, e);
            }
            Err(e) => return reject(state, connection_id, JoinError::MembershipUnavailable(e.to_string())),
        }
    }

    match state.registry.join(connection_id, request) {
        Ok(result) => {
            state.registry.send_to(
                connection_id,
                ServerEvent::SessionInfo(SessionInfo {
                    session_id,
                    num_participants: result.participant_count,
                }),
            );
            Ok(result)
        }
        Err(e) => reject(state, connection_id, e),
    }
}

fn reject(state: &AppState, connection_id: &str, e: JoinError) -> Result<JoinResult, JoinError> {
    warn!("Rejected join from {}: {}", connection_id, e);
    state.registry.send_to(
        connection_id,
        ServerEvent::Error(ErrorEvent {
            code: e.code().to_string(),
            message: e.to_string(),
        }),
    );
    Err(e)
}
