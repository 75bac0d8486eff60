//! WebSocket connection handling
//!
//! Each connection runs three pieces: a writer task draining the session's
//! outbound channel into the socket, a reader task delivering inbound frames
//! into the registry, and the orchestrator loop that decodes `source_info`
//! messages and drives the transfer coordinator.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use framecast_core::{ChannelMessage, MpscChannel, SessionChannel, SessionId};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;

use super::protocol::{ClientMessage, ServerMessage, SourceInfo};

/// Outbound messages buffered per connection before sends start waiting
const OUTBOUND_CAPACITY: usize = 32;

/// Why the orchestrator loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The peer left or the session was torn down elsewhere
    Closed,
    /// No inbound activity within the configured timeout
    TimedOut,
}

/// WebSocket upgrade handler for `/api/ws/:user_id`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session_id = SessionId::from(user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Handle a WebSocket connection from admission to cleanup
async fn handle_socket(socket: WebSocket, session_id: SessionId, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    let (channel, outbound) = MpscChannel::new(OUTBOUND_CAPACITY);
    let channel = Arc::new(channel);
    let writer = tokio::spawn(write_outbound(sink, outbound));

    if let Err(e) = state
        .registry
        .connect(
            session_id,
            Arc::clone(&channel) as Arc<dyn SessionChannel>,
            state.config.inbox_capacity,
        )
        .await
    {
        warn!(session_id = %session_id, error = %e, "Refusing session");
        if let Ok(message) = ChannelMessage::json(&ServerMessage::from(&e)) {
            let _ = channel.send(message).await;
        }
        channel.close().await;
        let _ = writer.await;
        return;
    }
    drop(channel);

    let reader = tokio::spawn(read_inbound(stream, session_id, Arc::clone(&state)));

    let end = orchestrate(&state, session_id).await;
    debug!(session_id = %session_id, end = ?end, "Orchestrator finished");

    // Both calls are idempotent; the reader or the event forwarder may have
    // already removed the session
    state.registry.disconnect(session_id).await;
    state.coordinator.cancel(session_id).await;

    reader.abort();
    let _ = writer.await;
    info!(session_id = %session_id, "Session closed");
}

/// Drain the outbound channel into the socket until the channel closes
async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ChannelMessage>,
) {
    while let Some(message) = outbound.recv().await {
        let frame = match message {
            ChannelMessage::Json(value) => Message::Text(value.to_string().into()),
            ChannelMessage::Binary(bytes) => Message::Binary(bytes.into()),
        };
        if sink.send(frame).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Deliver inbound frames to the registry until the peer goes away
async fn read_inbound(
    mut stream: SplitStream<WebSocket>,
    session_id: SessionId,
    state: Arc<AppState>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(value) => {
                    if state.registry.deliver(session_id, value).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(session_id = %session_id, error = %e, "Malformed JSON from client");
                    let _ = state
                        .registry
                        .send_json(
                            session_id,
                            &ServerMessage::error("invalid_message", format!("malformed JSON: {}", e)),
                        )
                        .await;
                }
            },
            Ok(Message::Binary(_)) => {
                // Frames travel through shared textures, never over the socket
                let _ = state
                    .registry
                    .send_json(
                        session_id,
                        &ServerMessage::error("unsupported", "binary frames are not accepted"),
                    )
                    .await;
            }
            Ok(Message::Close(_)) => {
                debug!(session_id = %session_id, "Client sent close frame");
                break;
            }
            Ok(_) => {
                // Ping and pong
            }
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    // Wakes the orchestrator's pending receive
    state.registry.disconnect(session_id).await;
}

/// Receive and act on messages until the session ends
async fn orchestrate(state: &AppState, session_id: SessionId) -> SessionEnd {
    let idle_timeout = state.config.timeout;

    loop {
        let deadline = if idle_timeout.is_zero() {
            None
        } else {
            let Ok(last_activity) = state.registry.last_activity(session_id).await else {
                return SessionEnd::Closed;
            };
            // A deadline past what Instant can represent never fires
            last_activity.checked_add(idle_timeout)
        };

        let next = match deadline {
            None => state.registry.receive(session_id).await,
            Some(deadline) => {
                if Instant::now() >= deadline {
                    info!(session_id = %session_id, "Session idle, closing");
                    let _ = state
                        .registry
                        .send_json(session_id, &ServerMessage::timeout())
                        .await;
                    return SessionEnd::TimedOut;
                }

                tokio::select! {
                    result = state.registry.receive(session_id) => result,
                    // Activity may have moved the deadline; re-check
                    _ = tokio::time::sleep_until(deadline) => continue,
                }
            }
        };

        match next {
            Ok(value) => handle_message(state, session_id, value).await,
            Err(_) => return SessionEnd::Closed,
        }
    }
}

/// Apply one decoded inbound message
async fn handle_message(state: &AppState, session_id: SessionId, value: serde_json::Value) {
    let info = match ClientMessage::from_value(value) {
        Ok(message) => SourceInfo::from(message),
        Err(e) => {
            debug!(session_id = %session_id, error = %e, "Rejected client message");
            let _ = state
                .registry
                .send_json(session_id, &ServerMessage::error("invalid_message", e.to_string()))
                .await;
            return;
        }
    };

    match state
        .coordinator
        .update(session_id, info.width, info.height, info.handle, info.params)
        .await
    {
        Ok(result) => {
            // The new output handle reaches the client through the event forwarder
            debug!(
                session_id = %session_id,
                restarted = result.restarted,
                output_handle = ?result.output_handle,
                "Source info applied"
            );
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Source info rejected");
            let _ = state
                .registry
                .send_json(session_id, &ServerMessage::from(&e))
                .await;
        }
    }
}
