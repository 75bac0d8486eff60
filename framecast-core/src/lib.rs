//! framecast-core: session admission and texture-transfer coordination
//!
//! This crate provides the foundational components for framecast:
//!
//! - **Session registry** - [`SessionRegistry`] admits clients under a global cap and
//!   owns each session's bounded inbound queues
//! - **Transfer coordination** - [`TransferCoordinator`] owns one [`SessionTransferState`]
//!   per session and restarts its transfer loop whenever geometry or source change
//! - **Shared textures** - [`TextureProvider`] and [`SharedTexture`] describe the
//!   interprocess texture capability, with [`MemoryTextureProvider`] as an in-process backend
//! - **Compute kernel** - [`FrameGenerator`] is the opaque `predict` operation
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use framecast_core::{
//!     GenerationParams, MemoryTextureProvider, PassthroughGenerator, SessionId,
//!     TextureProvider, TransferConfig, TransferCoordinator,
//! };
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(MemoryTextureProvider::new());
//!     let (coordinator, mut events) = TransferCoordinator::new(
//!         provider.clone(),
//!         Arc::new(PassthroughGenerator),
//!         TransferConfig::default(),
//!     );
//!
//!     // A client-owned texture the session streams from
//!     let source = provider.create(64, 64)?;
//!
//!     let session = SessionId::new();
//!     coordinator
//!         .update(session, 64, 64, source.handle(), GenerationParams::default())
//!         .await?;
//!
//!     if let Some(event) = events.recv().await {
//!         println!("output texture changed: {:?}", event);
//!     }
//!
//!     coordinator.cancel_all().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌───────────────────────────────────────────┐
//! │   SessionRegistry    │      │            TransferCoordinator            │
//! │  id -> channel,      │      │  id -> SessionTransferState               │
//! │        inbox,        │      │  ┌─────────────────────────────────────┐  │
//! │        last activity │      │  │ TransferLoop (blocking worker)      │  │
//! └──────────────────────┘      │  │  import -> predict -> export        │  │
//!                               │  └─────────────────────────────────────┘  │
//!                               └──────────────────┬────────────────────────┘
//!                                                  │ TransferEvent
//!                                                  ▼
//!                                             orchestrator
//! ```

pub mod error;
pub mod kernel;
pub mod session;
pub mod texture;
pub mod transfer;

// Re-export key types for convenience
pub use error::{FramecastError, KernelError, RegistryError, TextureError, TransferError};
pub use kernel::{
    Frame, FrameGenerator, GenerationParams, GeneratorKind, InvertGenerator, PassthroughGenerator,
    PredictRequest,
};
pub use session::{
    Backpressure, ChannelClosed, ChannelMessage, MpscChannel, RegistryConfig, SessionChannel,
    SessionId, SessionRegistry,
};
pub use texture::{
    AccessKind, AccessRecord, MemoryTextureProvider, PixelBuffer, SharedTexture, TextureAccess,
    TextureHandle, TextureProvider,
};
pub use transfer::{
    Reconfigured, SessionTransferState, TransferConfig, TransferCoordinator, TransferEvent,
    TransferEvents, TransferSnapshot,
};
