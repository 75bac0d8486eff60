//! Shared test utilities for framecast-server integration tests

pub mod client;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use framecast_core::{
    FrameGenerator, MemoryTextureProvider, PassthroughGenerator, TransferConfig,
};
use framecast_server::{AppState, FramecastServer, ServerConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// A running server plus handles tests poke at directly
#[allow(dead_code)]
pub struct TestServer {
    pub state: Arc<AppState>,
    pub addr: SocketAddr,
    /// Same backend the server uses; tests create client textures here
    pub provider: Arc<MemoryTextureProvider>,
    pub shutdown: CancellationToken,
}

/// Default config with a fast transfer cadence
#[allow(dead_code)]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        transfer: TransferConfig {
            cadence: Duration::from_millis(1),
        },
        ..ServerConfig::new("127.0.0.1", 0)
    }
}

/// Creates a test server with default config
#[allow(dead_code)]
pub async fn create_test_server() -> TestServer {
    create_test_server_with_config(test_config()).await
}

/// Creates a test server with custom config and the passthrough kernel
#[allow(dead_code)]
pub async fn create_test_server_with_config(config: ServerConfig) -> TestServer {
    create_test_server_with_kernel(config, Arc::new(PassthroughGenerator)).await
}

/// Creates a test server with custom config and kernel
#[allow(dead_code)]
pub async fn create_test_server_with_kernel(
    config: ServerConfig,
    generator: Arc<dyn FrameGenerator>,
) -> TestServer {
    let provider = Arc::new(MemoryTextureProvider::new());
    let (state, events) =
        AppState::with_components(config.clone(), provider.clone(), generator);
    let state = Arc::new(state);

    let server = FramecastServer::with_state(config, Arc::clone(&state), events);
    let shutdown = server.shutdown_token();
    let addr = spawn_server(server).await;

    TestServer {
        state,
        addr,
        provider,
        shutdown,
    }
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: FramecastServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(Duration::from_millis(10)).await;

    addr
}

/// Polls `check` until it returns true or two seconds pass
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
