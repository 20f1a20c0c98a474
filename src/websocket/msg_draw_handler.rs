use tracing::{debug, warn};

use crate::models::{DrawMessage, ServerEvent};
use crate::ws::registry::{Delivery, RelayError, RoomRegistry};

/// Publish a whiteboard event to every other member of the room, stamped
/// with the sender's user id so receivers can suppress their own echoes.
pub fn handle_draw_message(
    registry: &RoomRegistry,
    connection_id: &str,
    draw_msg: DrawMessage,
) -> Result<usize, RelayError> {
    let room_id = draw_msg.session_id.clone();
    let kind = draw_msg.event.kind();

    let result = registry.relay(connection_id, room_id.as_deref(), Delivery::Others, |sender| {
        ServerEvent::Draw(DrawMessage {
            user_id: Some(sender.user_id.clone()),
            ..draw_msg
        })
    });

    match &result {
        Ok(n) => debug!("Relayed draw {} from {} to {} members", kind, connection_id, n),
        Err(e) => warn!("Dropped draw {} from {}: {}", kind, connection_id, e),
    }
    result
}
