//! Session id to transfer state table

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, warn};

use super::events::TransferEvents;
use super::state::{Reconfigured, SessionTransferState, TransferSnapshot};
use super::{TransferConfig, TransferContext};
use crate::error::TransferError;
use crate::kernel::{FrameGenerator, GenerationParams};
use crate::session::SessionId;
use crate::texture::{TextureHandle, TextureProvider};

type StateRef = Arc<Mutex<SessionTransferState>>;

/// Owns every session's [`SessionTransferState`]
///
/// The table lock is only held to look up, insert or remove entries. Loop
/// shutdown happens under the per-session lock, so a slow kernel call on one
/// session never stalls another.
pub struct TransferCoordinator {
    ctx: Arc<TransferContext>,
    sessions: Mutex<HashMap<SessionId, StateRef>>,
}

impl TransferCoordinator {
    /// Create a coordinator and the receiver for its events
    pub fn new(
        provider: Arc<dyn TextureProvider>,
        generator: Arc<dyn FrameGenerator>,
        config: TransferConfig,
    ) -> (Self, TransferEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            ctx: Arc::new(TransferContext {
                provider,
                generator,
                config,
                events,
                live_loops: Arc::new(AtomicUsize::new(0)),
            }),
            sessions: Mutex::new(HashMap::new()),
        };
        (coordinator, rx)
    }

    /// Name of the kernel every loop runs
    pub fn generator_name(&self) -> &str {
        self.ctx.generator.name()
    }

    /// Configure a session, creating its transfer state on first use
    #[instrument(name = "transfer::update", skip(self, session_id, params), fields(session_id = %session_id))]
    pub async fn update(
        &self,
        session_id: SessionId,
        width: u32,
        height: u32,
        handle: TextureHandle,
        params: GenerationParams,
    ) -> Result<Reconfigured, TransferError> {
        if width == 0 || height == 0 {
            return Err(TransferError::InvalidGeometry { width, height });
        }

        let state = {
            let mut sessions = self.sessions.lock().await;
            Arc::clone(sessions.entry(session_id).or_insert_with(|| {
                debug!("Creating transfer state");
                Arc::new(Mutex::new(SessionTransferState::new(
                    session_id,
                    Arc::clone(&self.ctx),
                )))
            }))
        };

        let mut state = state.lock().await;
        state.reconfigure(width, height, handle, params).await
    }

    /// Tear down one session's transfer state
    ///
    /// Returns false if the session had none.
    #[instrument(name = "transfer::cancel", skip(self, session_id), fields(session_id = %session_id))]
    pub async fn cancel(&self, session_id: SessionId) -> bool {
        let Some(state) = self.sessions.lock().await.remove(&session_id) else {
            return false;
        };

        if let Err(e) = state.lock().await.shutdown().await {
            warn!(error = %e, "Transfer state shut down with error");
        }
        info!("Transfer state cancelled");
        true
    }

    /// Tear down every session and wait for all loops to exit
    #[instrument(name = "transfer::cancel_all", skip(self))]
    pub async fn cancel_all(&self) {
        let states: Vec<(SessionId, StateRef)> = self.sessions.lock().await.drain().collect();
        if states.is_empty() {
            return;
        }

        let count = states.len();
        join_all(states.into_iter().map(|(session_id, state)| async move {
            if let Err(e) = state.lock().await.shutdown().await {
                warn!(session_id = %session_id, error = %e, "Transfer state shut down with error");
            }
        }))
        .await;

        info!(count, live_loops = self.active_loops(), "All transfer states cancelled");
    }

    /// Number of sessions with transfer state
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Number of transfer workers that have not exited
    pub fn active_loops(&self) -> usize {
        self.ctx.live_loops.load(Ordering::SeqCst)
    }

    /// Current geometry, handles and params for a session
    pub async fn snapshot(&self, session_id: SessionId) -> Option<TransferSnapshot> {
        let state = self.sessions.lock().await.get(&session_id).cloned()?;
        let state = state.lock().await;
        Some(state.snapshot())
    }
}
