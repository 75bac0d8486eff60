//! The transfer loop and its blocking worker
//!
//! A [`TransferLoop`] owns both textures by value while it runs. Stopping it
//! is two-phase: cancel the token, then await the join handle, which hands
//! the textures back in a [`LoopOutcome`]. Nothing else can touch the
//! textures in between, so the next loop's first access always begins after
//! the previous loop's last one.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::events::{EventSink, TransferEvent};
use crate::error::{FramecastError, TextureError};
use crate::kernel::{Frame, FrameGenerator, GenerationParams, PredictRequest};
use crate::session::SessionId;
use crate::texture::{PixelBuffer, SharedTexture, TextureAccess};

/// The imported source texture and the exported output texture
pub(crate) struct LoopResources {
    pub source: Box<dyn SharedTexture>,
    pub output: Box<dyn SharedTexture>,
}

/// Why a transfer loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    Failed(String),
}

/// What a finished loop hands back to its owner
pub(crate) struct LoopOutcome {
    pub resources: LoopResources,
    pub exit: LoopExit,
    pub frames: u64,
}

enum Tick {
    Produced,
    Skipped,
}

/// Scratch buffers reused across ticks
///
/// `scaled` exists only when the source texture differs in size from the
/// output, in which case each imported frame is resampled to the output size.
struct Buffers {
    input: PixelBuffer,
    scaled: Option<PixelBuffer>,
    frame: Frame,
    output: PixelBuffer,
}

impl Buffers {
    fn allocate(source: (u32, u32), output: (u32, u32)) -> Result<Self, FramecastError> {
        let (width, height) = output;
        let scaled = if source != output {
            Some(PixelBuffer::new(width, height)?)
        } else {
            None
        };
        Ok(Self {
            input: PixelBuffer::new(source.0, source.1)?,
            scaled,
            frame: Frame::new(width, height)?,
            output: PixelBuffer::opaque(width, height)?,
        })
    }
}

/// Pull, predict, push, sleep, until cancelled
pub(crate) struct TransferLoop {
    pub session_id: SessionId,
    pub resources: LoopResources,
    pub generator: Arc<dyn FrameGenerator>,
    pub params: watch::Receiver<GenerationParams>,
    pub cancel: CancellationToken,
    pub cadence: Duration,
    pub events: EventSink,
}

impl TransferLoop {
    /// Run on the current thread until cancelled or a fault occurs
    pub fn run(mut self) -> LoopOutcome {
        let source_size = self.resources.source.dimensions();
        let (width, height) = self.resources.output.dimensions();
        let mut frames = 0u64;

        debug!(
            session_id = %self.session_id,
            width,
            height,
            resampled = source_size != (width, height),
            "Transfer loop started"
        );

        let exit = match Buffers::allocate(source_size, (width, height)) {
            Ok(mut buffers) => loop {
                if self.cancel.is_cancelled() {
                    break LoopExit::Cancelled;
                }

                match self.tick(&mut buffers) {
                    Ok(Tick::Produced) => frames += 1,
                    Ok(Tick::Skipped) => {}
                    Err(e) => break LoopExit::Failed(e.to_string()),
                }

                std::thread::sleep(self.cadence);
            },
            Err(e) => LoopExit::Failed(e.to_string()),
        };

        match &exit {
            LoopExit::Cancelled => {
                debug!(session_id = %self.session_id, frames, "Transfer loop cancelled");
            }
            LoopExit::Failed(reason) => {
                warn!(session_id = %self.session_id, frames, reason = %reason, "Transfer loop failed");
                let _ = self.events.send(TransferEvent::LoopStopped {
                    session_id: self.session_id,
                    reason: reason.clone(),
                });
            }
        }

        LoopOutcome {
            resources: self.resources,
            exit,
            frames,
        }
    }

    fn tick(&mut self, buffers: &mut Buffers) -> Result<Tick, FramecastError> {
        match TextureAccess::acquire(self.resources.source.as_mut()) {
            Ok(mut access) => access.copy_out(&mut buffers.input)?,
            Err(TextureError::Busy(handle)) => {
                trace!(session_id = %self.session_id, handle, "Source texture busy, skipping tick");
                return Ok(Tick::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(scaled) = buffers.scaled.as_mut() {
            buffers.input.resample_into(scaled);
        }
        let input = buffers.scaled.as_ref().unwrap_or(&buffers.input);
        buffers.frame.load_rgba(input);

        // Clone so a concurrent params update never waits on the kernel
        let params = self.params.borrow_and_update().clone();
        let request = PredictRequest {
            params: &params,
            width: input.width(),
            height: input.height(),
            image: &buffers.frame,
        };

        let Some(generated) = self.generator.predict(&request)? else {
            trace!(session_id = %self.session_id, "Kernel produced nothing, skipping tick");
            return Ok(Tick::Skipped);
        };
        generated.store_rgb(&mut buffers.output)?;

        match TextureAccess::acquire(self.resources.output.as_mut()) {
            Ok(mut access) => access.copy_in(&buffers.output)?,
            Err(TextureError::Busy(handle)) => {
                trace!(session_id = %self.session_id, handle, "Output texture busy, dropping frame");
                return Ok(Tick::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Tick::Produced)
    }
}

/// Keeps the live-worker count accurate even if the worker panics
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running transfer loop
pub(crate) struct LoopHandle {
    cancel: CancellationToken,
    join: JoinHandle<LoopOutcome>,
}

impl LoopHandle {
    /// Start `transfer` on the blocking pool
    pub fn spawn(transfer: TransferLoop, live_loops: &Arc<AtomicUsize>) -> Self {
        let cancel = transfer.cancel.clone();
        let live = LiveGuard::enter(live_loops);
        let join = tokio::task::spawn_blocking(move || {
            let _live = live;
            transfer.run()
        });
        Self { cancel, join }
    }

    /// Whether the worker has already returned
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the loop and wait for the worker to return
    ///
    /// An in-flight kernel call is not interrupted; this waits for it.
    pub async fn stop(mut self) -> Result<LoopOutcome, JoinError> {
        self.cancel.cancel();
        (&mut self.join).await
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        // A handle dropped without `stop` still winds its worker down
        self.cancel.cancel();
    }
}
