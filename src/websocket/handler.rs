use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{ClientEvent, ServerEvent, SignalingMessage};
use crate::services::auth_service;
use crate::websocket::msg_chat_handler::handle_chat_message;
use crate::websocket::msg_draw_handler::handle_draw_message;
use crate::websocket::msg_join_handler::handle_join_message;
use crate::websocket::msg_recording_handler::{handle_recording_notice, RecordingAction};
use crate::websocket::msg_signal_handler::handle_signal_message;
use crate::ws::connctx::{ConnCtx, ConnectionGuard};
use crate::ws::registry::{JoinError, RelayError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub ticket: Option<String>,
}

/// WebSocket handler
pub async fn websocket_handler(
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    info!("New WebSocket connection attempt");

    let authenticated_user = match authenticate_upgrade(&state, &params, &headers) {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, authenticated_user))
}

/// Resolve the user behind an upgrade request. With authentication disabled
/// every connection is anonymous and identifies itself in `join-session`.
fn authenticate_upgrade(
    state: &AppState,
    params: &WsParams,
    headers: &HeaderMap,
) -> Result<Option<String>, StatusCode> {
    let Some(secret) = state.config.auth_jwt_secret.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Some(ticket) = &params.ticket {
        return match state.tickets.redeem(ticket, Utc::now()) {
            Ok(user_id) => Ok(Some(user_id)),
            Err(e) => {
                warn!("WebSocket ticket refused: {}", e);
                Err(StatusCode::UNAUTHORIZED)
            }
        };
    }

    match auth_service::authenticate_headers(headers, secret) {
        Ok(user_id) => Ok(Some(user_id)),
        Err(e) => {
            warn!("WebSocket authentication failed: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, authenticated_user: Option<String>) {
    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4().to_string();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    // One ordered, bounded outbound queue per connection
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.config.outbound_queue_capacity());
    let ctx = ConnCtx::new(connection_id.clone(), tx, authenticated_user);
    let overflow = ctx.overflow_signal();
    state.registry.connect(ctx);
    let _guard = ConnectionGuard::new(state.registry.clone(), connection_id.clone());

    let (mut sender, mut receiver) = socket.split();

    // Drain the outbound queue into the socket
    let send_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {} for {}: {}", event.name(), send_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Handle inbound frames one at a time, in arrival order
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let event: ClientEvent = match serde_json::from_str(&text) {
                Ok(event) => event,
                Err(e) => {
                    error!("Failed to parse message from {}: {}", recv_id, e);
                    continue;
                }
            };

            let name = event.name();
            if let Err(e) = dispatch(&state, &recv_id, event).await {
                debug!("{} from {} was not relayed: {}", name, recv_id, e);
            }
        }
    });

    // Wait for either task to finish (and finish the other). A client that
    // let its queue overflow is cut off.
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
        _ = overflow.notified() => {
            warn!("Closing slow WebSocket connection {}", connection_id);
            send_task.abort();
            recv_task.abort();
        }
    };
    info!("WebSocket connection {} terminated", connection_id);
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Route one inbound event to its handler. Refusals are logged by the
/// handlers and never affect the connection.
pub async fn dispatch(state: &AppState, connection_id: &str, event: ClientEvent) -> Result<(), DispatchError> {
    debug!("Dispatching {} from {}", event.name(), connection_id);
    match event {
        ClientEvent::JoinSession(join_msg) => {
            handle_join_message(state, connection_id, join_msg).await?;
        }
        ClientEvent::Draw(draw_msg) => {
            handle_draw_message(&state.registry, connection_id, draw_msg)?;
        }
        ClientEvent::Message(chat_msg) => {
            // Persistence continues in the background
            handle_chat_message(&state.registry, &state.store, connection_id, chat_msg)?;
        }
        ClientEvent::Offer(msg) => {
            handle_signal_message(&state.registry, connection_id, SignalingMessage::from(msg))?;
        }
        ClientEvent::Answer(msg) => {
            handle_signal_message(&state.registry, connection_id, SignalingMessage::from(msg))?;
        }
        ClientEvent::IceCandidate(msg) => {
            handle_signal_message(&state.registry, connection_id, SignalingMessage::from(msg))?;
        }
        ClientEvent::StartRecording(notice) => {
            handle_recording_notice(&state.registry, connection_id, RecordingAction::Started, notice)?;
        }
        ClientEvent::StopRecording(notice) => {
            handle_recording_notice(&state.registry, connection_id, RecordingAction::Stopped, notice)?;
        }
    }
    Ok(())
}
