//! framecast-server - HTTP and WebSocket surface for framecast
//!
//! This crate owns the [`SessionRegistry`](framecast_core::SessionRegistry) and
//! [`TransferCoordinator`](framecast_core::TransferCoordinator). Clients connect
//! on `/api/ws/:user_id`, announce their source texture with a `source_info`
//! message, and receive the handle of the texture generated frames are written
//! to.

mod error;
pub mod events;
pub mod http;
mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use framecast_core::{Backpressure, GeneratorKind, TransferConfig, TransferEvents};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use http::create_router;
pub use state::AppState;

/// The main framecast server
pub struct FramecastServer {
    config: ServerConfig,
    state: Arc<AppState>,
    events: TransferEvents,
    shutdown: CancellationToken,
}

impl FramecastServer {
    /// Create a new server with the in-memory texture backend
    pub fn new(config: ServerConfig) -> Self {
        let (state, events) = AppState::new(config.clone());
        Self::with_state(config, Arc::new(state), events)
    }

    /// Create a server with custom state (for testing)
    pub fn with_state(config: ServerConfig, state: Arc<AppState>, events: TransferEvents) -> Self {
        Self {
            config,
            state,
            events,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the server, binding to the configured address
    ///
    /// Stops on Ctrl-C or when the shutdown token is cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("framecast server listening on {}", addr);

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, shutting down");
                shutdown.cancel();
            }
        });

        self.run_with_listener(listener).await
    }

    /// Run the server on an already-bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let state = self.state;
        let forwarder = events::spawn_event_forwarder(Arc::clone(&state), self.events);

        let router = create_router(Arc::clone(&state));
        let shutdown = self.shutdown.clone();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        // Upgraded sockets outlive the HTTP server; end their sessions explicitly
        let sessions = state.registry.session_ids().await;
        tracing::info!(sessions = sessions.len(), "Server stopped, closing sessions");
        for session_id in sessions {
            state.registry.disconnect(session_id).await;
        }
        state.coordinator.cancel_all().await;
        forwarder.abort();

        served.map_err(ServerError::Serve)
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum concurrently admitted sessions, 0 for unlimited
    pub max_queue_size: usize,
    /// Idle time after which a session is closed, zero to disable
    pub timeout: Duration,
    /// Capacity of each session's inbound queues, 0 for unbounded
    pub inbox_capacity: usize,
    /// What happens when a session's inbound queue is full
    pub backpressure: Backpressure,
    /// Transfer loop cadence
    pub transfer: TransferConfig,
    /// Kernel run by every transfer loop
    pub kernel: GeneratorKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            max_queue_size: 0,
            timeout: Duration::ZERO,
            inbox_capacity: 8,
            backpressure: Backpressure::default(),
            transfer: TransferConfig::default(),
            kernel: GeneratorKind::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:7860")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
