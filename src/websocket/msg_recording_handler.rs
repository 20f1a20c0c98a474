use tracing::{info, warn};

use crate::models::{RecordingNotice, RecordingPresence, ServerEvent};
use crate::ws::registry::{Delivery, RelayError, RoomRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingAction {
    Started,
    Stopped,
}

/// Tell the whole room that a participant started or stopped recording.
/// Capture itself happens on the participant's device.
pub fn handle_recording_notice(
    registry: &RoomRegistry,
    connection_id: &str,
    action: RecordingAction,
    notice: RecordingNotice,
) -> Result<usize, RelayError> {
    let result = registry.relay(connection_id, notice.session_id.as_deref(), Delivery::Everyone, |sender| {
        let presence = RecordingPresence {
            user_id: sender.user_id.clone(),
            user_name: notice.user_name.clone().or_else(|| sender.user_name.clone()),
        };
        match action {
            RecordingAction::Started => ServerEvent::RecordingStarted(presence),
            RecordingAction::Stopped => ServerEvent::RecordingStopped(presence),
        }
    });

    match &result {
        Ok(_) => info!("Recording {:?} in session {:?} by {}", action, notice.session_id, connection_id),
        Err(e) => warn!("Dropped recording notice from {}: {}", connection_id, e),
    }
    result
}
