//! Per-session texture transfer
//!
//! Each session that has announced a source texture gets one
//! [`SessionTransferState`], owned by the [`TransferCoordinator`]. The state
//! runs at most one transfer loop on a blocking worker: import a frame from
//! the client's texture, run the kernel, export the result into a texture the
//! server created. Changing geometry or source restarts the loop; changing
//! only the generation parameters does not.

pub mod coordinator;
pub mod events;
pub mod state;
pub mod worker;

pub use coordinator::TransferCoordinator;
pub use events::{TransferEvent, TransferEvents};
pub use state::{Reconfigured, SessionTransferState, TransferSnapshot};
pub use worker::LoopExit;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use crate::kernel::FrameGenerator;
use crate::texture::TextureProvider;

/// Default loop cadence, one tick per display frame at 60 Hz
pub const DEFAULT_FPS: u32 = 60;

/// Transfer loop settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Fixed sleep between iterations, not adjusted for processing time
    pub cadence: Duration,
}

impl TransferConfig {
    /// Cadence of `1 / fps` seconds; 0 falls back to the default rate
    pub fn with_fps(fps: u32) -> Self {
        let fps = if fps == 0 { DEFAULT_FPS } else { fps };
        Self {
            cadence: Duration::from_secs_f64(1.0 / f64::from(fps)),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::with_fps(DEFAULT_FPS)
    }
}

/// Collaborators shared by every session's transfer state
pub(crate) struct TransferContext {
    pub provider: Arc<dyn TextureProvider>,
    pub generator: Arc<dyn FrameGenerator>,
    pub config: TransferConfig,
    pub events: events::EventSink,
    /// Number of workers that have not returned yet
    pub live_loops: Arc<AtomicUsize>,
}
