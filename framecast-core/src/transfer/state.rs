//! Per-session transfer state and the reconfigure protocol

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::TransferContext;
use super::events::TransferEvent;
use super::worker::{LoopHandle, LoopResources, TransferLoop};
use crate::error::TransferError;
use crate::kernel::GenerationParams;
use crate::session::SessionId;
use crate::texture::{SharedTexture, TextureHandle};

/// Result of a successful [`SessionTransferState::reconfigure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconfigured {
    /// Whether the transfer loop was (re)started
    pub restarted: bool,
    /// Set when a new exported texture was installed
    pub output_handle: Option<TextureHandle>,
}

/// Point-in-time view of a session's transfer state
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSnapshot {
    pub session_id: SessionId,
    pub width: u32,
    pub height: u32,
    pub source_handle: Option<TextureHandle>,
    pub output_handle: Option<TextureHandle>,
    pub running: bool,
    pub params: GenerationParams,
}

/// Geometry, source, textures and loop of one session
///
/// At most one loop runs at a time. While it runs it owns the textures;
/// between loops they are parked here.
pub struct SessionTransferState {
    session_id: SessionId,
    width: u32,
    height: u32,
    source_handle: Option<TextureHandle>,
    output_handle: Option<TextureHandle>,
    params: watch::Sender<GenerationParams>,
    active: Option<LoopHandle>,
    parked: Option<LoopResources>,
    retired: bool,
    ctx: Arc<TransferContext>,
}

impl SessionTransferState {
    pub(crate) fn new(session_id: SessionId, ctx: Arc<TransferContext>) -> Self {
        let (params, _) = watch::channel(GenerationParams::default());
        Self {
            session_id,
            width: 0,
            height: 0,
            source_handle: None,
            output_handle: None,
            params,
            active: None,
            parked: None,
            retired: false,
            ctx,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Whether a worker is currently running
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|loop_| !loop_.is_finished())
    }

    /// Apply a new configuration, restarting the loop only if needed
    ///
    /// A restart happens when width, height or source handle differ from the
    /// stored values, or when the previous worker has already exited.
    /// Replacement textures are acquired before the running loop is stopped,
    /// so a failed import or allocation leaves the previous loop untouched.
    /// Parameters are replaced on every successful call.
    pub async fn reconfigure(
        &mut self,
        width: u32,
        height: u32,
        source_handle: TextureHandle,
        params: GenerationParams,
    ) -> Result<Reconfigured, TransferError> {
        if self.retired {
            return Err(TransferError::SessionClosed(self.session_id));
        }
        if width == 0 || height == 0 {
            return Err(TransferError::InvalidGeometry { width, height });
        }

        // A worker that exited on its own gives its textures back here
        if self.active.as_ref().is_some_and(LoopHandle::is_finished)
            && let Some(finished) = self.active.take()
        {
            self.collect(finished).await;
        }

        let geometry_changed = (width, height) != (self.width, self.height);
        let handle_changed = self.source_handle != Some(source_handle);
        let running = self.active.is_some();
        let intact = running || self.parked.is_some();

        if running && !geometry_changed && !handle_changed {
            self.params.send_replace(params);
            return Ok(Reconfigured {
                restarted: false,
                output_handle: None,
            });
        }

        let new_source = if handle_changed || !intact {
            Some(self.open_source(source_handle)?)
        } else {
            None
        };
        let new_output = if geometry_changed || !intact {
            Some(self.create_output(width, height)?)
        } else {
            None
        };

        if let Some(previous) = self.active.take() {
            self.collect(previous).await;
        }
        let (old_source, old_output) = match self.parked.take() {
            Some(resources) => (Some(resources.source), Some(resources.output)),
            None => (None, None),
        };

        // Replaced textures are dropped here, after their loop has exited
        let source = match new_source.or(old_source) {
            Some(texture) => texture,
            None => self.open_source(source_handle)?,
        };
        let output = match new_output.or(old_output) {
            Some(texture) => texture,
            None => self.create_output(width, height)?,
        };

        self.width = width;
        self.height = height;
        self.source_handle = Some(source_handle);
        self.params.send_replace(params);

        let output_handle = output.handle();
        let output_changed = self.output_handle != Some(output_handle);
        self.output_handle = Some(output_handle);

        if output_changed {
            info!(
                session_id = %self.session_id,
                handle = output_handle,
                width,
                height,
                "Output texture changed"
            );
            let _ = self.ctx.events.send(TransferEvent::OutputHandleChanged {
                session_id: self.session_id,
                handle: output_handle,
                width,
                height,
            });
        }

        self.start(LoopResources { source, output });

        Ok(Reconfigured {
            restarted: true,
            output_handle: output_changed.then_some(output_handle),
        })
    }

    /// Stop the loop, release both textures and refuse further reconfiguration
    pub async fn shutdown(&mut self) -> Result<(), TransferError> {
        self.retired = true;
        let result = match self.active.take() {
            Some(active) => match active.stop().await {
                Ok(outcome) => {
                    debug!(session_id = %self.session_id, frames = outcome.frames, "Transfer loop joined");
                    Ok(())
                }
                Err(e) => {
                    error!(session_id = %self.session_id, error = %e, "Transfer worker did not exit cleanly");
                    Err(TransferError::WorkerPanicked(self.session_id))
                }
            },
            None => Ok(()),
        };
        self.parked = None;
        self.output_handle = None;
        result
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            session_id: self.session_id,
            width: self.width,
            height: self.height,
            source_handle: self.source_handle,
            output_handle: self.output_handle,
            running: self.is_running(),
            params: self.params.borrow().clone(),
        }
    }

    fn open_source(&self, handle: TextureHandle) -> Result<Box<dyn SharedTexture>, TransferError> {
        self.ctx
            .provider
            .open(handle)
            .map_err(|source| TransferError::TextureImportFailed { handle, source })
    }

    fn create_output(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn SharedTexture>, TransferError> {
        self.ctx
            .provider
            .create(width, height)
            .map_err(|source| TransferError::TextureCreateFailed {
                width,
                height,
                source,
            })
    }

    /// Join a worker and park whatever textures it returns
    async fn collect(&mut self, handle: LoopHandle) {
        match handle.stop().await {
            Ok(outcome) => {
                debug!(
                    session_id = %self.session_id,
                    frames = outcome.frames,
                    exit = ?outcome.exit,
                    "Transfer loop joined"
                );
                self.parked = Some(outcome.resources);
            }
            Err(e) => {
                // Textures died with the worker; the caller allocates new ones
                error!(session_id = %self.session_id, error = %e, "Transfer worker panicked");
            }
        }
    }

    fn start(&mut self, resources: LoopResources) {
        let transfer = TransferLoop {
            session_id: self.session_id,
            resources,
            generator: Arc::clone(&self.ctx.generator),
            params: self.params.subscribe(),
            cancel: CancellationToken::new(),
            cadence: self.ctx.config.cadence,
            events: self.ctx.events.clone(),
        };
        self.active = Some(LoopHandle::spawn(transfer, &self.ctx.live_loops));
    }
}
