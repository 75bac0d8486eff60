//! REST API handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use framecast_core::GenerationParams;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Number of admitted sessions
    pub active_sessions: usize,
    /// Number of transfer workers still running
    pub active_loops: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        active_sessions: state.registry.user_count().await,
        active_loops: state.coordinator.active_loops(),
    })
}

/// Response for `GET /api/queue`
#[derive(Debug, Serialize, Deserialize)]
pub struct QueueResponse {
    /// Number of admitted sessions
    pub queue_size: usize,
}

/// Current number of admitted sessions
pub async fn queue(State(state): State<Arc<AppState>>) -> Json<QueueResponse> {
    Json(QueueResponse {
        queue_size: state.registry.user_count().await,
    })
}

/// Response for `GET /api/settings`
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    /// Parameters a client gets if it sends the defaults
    pub input_params: GenerationParams,
    /// Session cap, 0 for unlimited
    pub max_queue_size: usize,
    /// Idle timeout in seconds, 0 when disabled
    pub timeout_secs: f64,
    /// Kernel every transfer loop runs
    pub kernel: String,
}

/// Settings a frontend needs to build its controls
pub async fn settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        input_params: GenerationParams::default(),
        max_queue_size: state.config.max_queue_size,
        timeout_secs: state.config.timeout.as_secs_f64(),
        kernel: state.coordinator.generator_name().to_string(),
    })
}
