//! Relays transfer events to the sessions they belong to

use std::sync::Arc;

use framecast_core::{TransferEvent, TransferEvents};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::AppState;
use crate::ws::ServerMessage;

/// Start a background task that forwards coordinator events to clients
pub fn spawn_event_forwarder(state: Arc<AppState>, mut events: TransferEvents) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            forward(&state, event).await;
        }
        debug!("Transfer event channel closed");
    })
}

async fn forward(state: &AppState, event: TransferEvent) {
    match event {
        TransferEvent::OutputHandleChanged {
            session_id,
            handle,
            width,
            height,
        } => {
            let message = ServerMessage::OutputHandle {
                handle,
                width,
                height,
            };
            match state.registry.send_json(session_id, &message).await {
                Ok(()) => trace!(session_id = %session_id, handle, "Sent output handle"),
                Err(e) => debug!(session_id = %session_id, error = %e, "Output handle not delivered"),
            }
        }
        TransferEvent::LoopStopped { session_id, reason } => {
            warn!(session_id = %session_id, reason = %reason, "Ending session after transfer loop failure");
            let _ = state
                .registry
                .send_json(session_id, &ServerMessage::error("loop_stopped", reason))
                .await;
            // The orchestrator sees the closed inbox and cancels the transfer state
            state.registry.disconnect(session_id).await;
        }
    }
}
