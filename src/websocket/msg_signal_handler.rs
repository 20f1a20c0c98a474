use tracing::{debug, warn};

use crate::models::{RelayedAnswer, RelayedIceCandidate, RelayedOffer, ServerEvent, SignalKind, SignalingMessage};
use crate::ws::registry::{Delivery, RelayError, RoomRegistry};

/// Forward an offer, answer or ICE candidate to the other members of the
/// room. The payload is never inspected. Events from connections outside the
/// room are dropped.
pub fn handle_signal_message(
    registry: &RoomRegistry,
    connection_id: &str,
    signal: SignalingMessage,
) -> Result<usize, RelayError> {
    let SignalingMessage { kind, room_id, payload } = signal;
    debug!("Received {} from {} for room {:?}", kind.as_str(), connection_id, room_id);

    let result = registry.relay(connection_id, room_id.as_deref(), Delivery::Others, |sender| match kind {
        SignalKind::Offer => ServerEvent::Offer(RelayedOffer {
            offer: payload,
            user_id: sender.user_id.clone(),
            user_name: sender.user_name.clone(),
            user_role: sender.user_role,
        }),
        SignalKind::Answer => ServerEvent::Answer(RelayedAnswer {
            answer: payload,
            user_id: sender.user_id.clone(),
        }),
        SignalKind::IceCandidate => ServerEvent::IceCandidate(RelayedIceCandidate {
            candidate: payload,
            user_id: sender.user_id.clone(),
        }),
    });

    if let Err(e) = &result {
        warn!("Dropped {} from {}: {}", kind.as_str(), connection_id, e);
    }
    result
}
