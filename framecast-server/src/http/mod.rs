//! HTTP server module

mod api;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::ws::ws_handler;

pub use api::{HealthResponse, QueueResponse, SettingsResponse};

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/queue", get(api::queue))
        .route("/api/settings", get(api::settings))
        .route("/api/ws/:user_id", get(ws_handler))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerConfig;
    use axum_test::TestServer;
    use framecast_core::{MpscChannel, SessionId};
    use std::time::Duration;

    fn test_state(config: ServerConfig) -> Arc<AppState> {
        let (state, _events) = AppState::new(config);
        Arc::new(state)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = TestServer::new(create_router(test_state(ServerConfig::default()))).unwrap();

        let response = server.get("/api/health").await;

        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.active_sessions, 0);
        assert_eq!(body.active_loops, 0);
    }

    #[tokio::test]
    async fn queue_counts_admitted_sessions() {
        let state = test_state(ServerConfig::default());
        let server = TestServer::new(create_router(Arc::clone(&state))).unwrap();

        let body: QueueResponse = server.get("/api/queue").await.json();
        assert_eq!(body.queue_size, 0);

        for _ in 0..2 {
            let (channel, _rx) = MpscChannel::new(1);
            state
                .registry
                .connect(SessionId::new(), Arc::new(channel), 4)
                .await
                .unwrap();
        }

        let body: QueueResponse = server.get("/api/queue").await.json();
        assert_eq!(body.queue_size, 2);
    }

    #[tokio::test]
    async fn settings_expose_defaults_and_limits() {
        let config = ServerConfig {
            max_queue_size: 5,
            timeout: Duration::from_secs(30),
            ..ServerConfig::default()
        };
        let server = TestServer::new(create_router(test_state(config))).unwrap();

        let body: SettingsResponse = server.get("/api/settings").await.json();

        assert_eq!(body.max_queue_size, 5);
        assert_eq!(body.timeout_secs, 30.0);
        assert_eq!(body.kernel, "passthrough");
        assert_eq!(body.input_params, framecast_core::GenerationParams::default());
    }

    #[tokio::test]
    async fn ws_route_rejects_plain_get() {
        let server = TestServer::new(create_router(test_state(ServerConfig::default()))).unwrap();

        let response = server
            .get(&format!("/api/ws/{}", SessionId::new()))
            .expect_failure()
            .await;

        assert!(response.status_code().is_client_error());
    }
}
