//! Shared application state for the framecast server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use framecast_core::{
    FrameGenerator, MemoryTextureProvider, RegistryConfig, SessionRegistry, TextureProvider,
    TransferCoordinator, TransferEvents,
};

use crate::ServerConfig;

/// Shared application state accessible by all handlers
pub struct AppState {
    /// Admitted sessions and their inbound queues
    pub registry: Arc<SessionRegistry>,
    /// Per-session transfer loops
    pub coordinator: Arc<TransferCoordinator>,
    /// Backend used to import and export shared textures
    pub provider: Arc<dyn TextureProvider>,
    /// Settings the server was started with
    pub config: ServerConfig,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state with the in-memory texture backend and the configured kernel
    pub fn new(config: ServerConfig) -> (Self, TransferEvents) {
        let generator = config.kernel.build();
        Self::with_components(config, Arc::new(MemoryTextureProvider::new()), generator)
    }

    /// Create state with custom texture backend and kernel
    pub fn with_components(
        config: ServerConfig,
        provider: Arc<dyn TextureProvider>,
        generator: Arc<dyn FrameGenerator>,
    ) -> (Self, TransferEvents) {
        let registry = SessionRegistry::new(RegistryConfig {
            max_sessions: config.max_queue_size,
            backpressure: config.backpressure,
            ..RegistryConfig::default()
        });
        let (coordinator, events) =
            TransferCoordinator::new(Arc::clone(&provider), generator, config.transfer);

        let state = Self {
            registry: Arc::new(registry),
            coordinator: Arc::new(coordinator),
            provider,
            config,
            started_at: Utc::now(),
        };
        (state, events)
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
