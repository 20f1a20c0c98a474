use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::models::{ChatMessage, ServerEvent};
use crate::services::session_store::SessionStore;
use crate::ws::registry::{Delivery, RelayError, RoomRegistry};

/// Broadcast a chat message to the whole room, sender included, then persist
/// it in the background.
///
/// Delivery never waits on persistence and a failed append is only logged.
/// The returned task is the pending append; dropping it does not cancel it.
pub fn handle_chat_message(
    registry: &RoomRegistry,
    store: &Arc<dyn SessionStore>,
    connection_id: &str,
    mut chat_msg: ChatMessage,
) -> Result<JoinHandle<()>, RelayError> {
    chat_msg.stamp(Utc::now());
    let room_id = chat_msg.session_id.clone();

    let delivered = registry.relay(connection_id, room_id.as_deref(), Delivery::Everyone, |sender| {
        chat_msg.sender_id = Some(sender.user_id.clone());
        if chat_msg.sender_name.is_none() {
            chat_msg.sender_name = sender.user_name.clone();
        }
        ServerEvent::Message(chat_msg.clone())
    });

    let delivered = match delivered {
        Ok(n) => n,
        Err(e) => {
            warn!("Dropped chat message from {}: {}", connection_id, e);
            return Err(e);
        }
    };
    debug!("Delivered chat message from {} to {} members", connection_id, delivered);

    let store = store.clone();
    Ok(tokio::spawn(async move {
        if let Err(e) = store.append_message(&chat_msg).await {
            error!(
                "Failed to persist chat message for session {:?}: {}",
                chat_msg.session_id, e
            );
        }
    }))
}
