//! Typed notifications from the transfer layer

use tokio::sync::mpsc;

use crate::session::SessionId;
use crate::texture::TextureHandle;

/// Something the orchestrator needs to relay to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// A new exported texture is installed; the client should read from `handle`
    OutputHandleChanged {
        session_id: SessionId,
        handle: TextureHandle,
        width: u32,
        height: u32,
    },
    /// The transfer loop exited on an error and will not produce frames
    /// until the session is reconfigured
    LoopStopped {
        session_id: SessionId,
        reason: String,
    },
}

impl TransferEvent {
    /// The session this event belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::OutputHandleChanged { session_id, .. } | Self::LoopStopped { session_id, .. } => {
                *session_id
            }
        }
    }
}

/// Receiving end of the coordinator's event channel
pub type TransferEvents = mpsc::UnboundedReceiver<TransferEvent>;

pub(crate) type EventSink = mpsc::UnboundedSender<TransferEvent>;
