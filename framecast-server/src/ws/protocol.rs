//! WebSocket protocol message types
//!
//! Every message is a JSON object tagged by its `status` field.

use framecast_core::{GenerationParams, RegistryError, TextureHandle, TransferError};
use serde::{Deserialize, Serialize};

/// Message shown to a client whose session hit the idle timeout
pub const TIMEOUT_MESSAGE: &str = "Your session has ended";

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", deny_unknown_fields)]
pub enum ClientMessage {
    /// Announce (or re-announce) the source texture and generation parameters
    SourceInfo {
        width: u32,
        height: u32,
        /// Handle of the client-owned texture to read frames from
        handle: TextureHandle,
        prompt: String,
        negative_prompt: String,
        steps: u32,
        strength: f32,
        guidance_scale: f32,
    },
}

impl ClientMessage {
    /// Decode a message delivered through the session inbox
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Geometry, source and params carried by a `source_info` message
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub handle: TextureHandle,
    pub params: GenerationParams,
}

impl From<ClientMessage> for SourceInfo {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::SourceInfo {
                width,
                height,
                handle,
                prompt,
                negative_prompt,
                steps,
                strength,
                guidance_scale,
            } => Self {
                width,
                height,
                handle,
                params: GenerationParams {
                    prompt,
                    negative_prompt,
                    steps,
                    strength,
                    guidance_scale,
                },
            },
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The session's output texture changed; read generated frames from `handle`
    OutputHandle {
        handle: TextureHandle,
        width: u32,
        height: u32,
    },

    /// The session was closed for inactivity
    Timeout { message: String },

    /// Admission was refused because the server is at capacity
    ServerFull { message: String },

    /// A request failed
    Error {
        /// Machine-readable failure class
        code: String,
        /// Human-readable description
        message: String,
    },
}

impl ServerMessage {
    pub fn timeout() -> Self {
        Self::Timeout {
            message: TIMEOUT_MESSAGE.to_string(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<&RegistryError> for ServerMessage {
    fn from(error: &RegistryError) -> Self {
        match error {
            RegistryError::ServerFull { .. } => Self::ServerFull {
                message: error.to_string(),
            },
            RegistryError::AlreadyConnected(_) => Self::error("already_connected", error.to_string()),
            RegistryError::SessionNotFound(_) => Self::error("session_not_found", error.to_string()),
            RegistryError::ChannelClosed(_) | RegistryError::SendTimeout(_) => {
                Self::error("channel_closed", error.to_string())
            }
        }
    }
}

impl From<&TransferError> for ServerMessage {
    fn from(error: &TransferError) -> Self {
        let code = match error {
            TransferError::InvalidGeometry { .. } => "invalid_geometry",
            TransferError::TextureImportFailed { .. } => "texture_import_failed",
            TransferError::TextureCreateFailed { .. } => "texture_create_failed",
            TransferError::SessionClosed(_) => "session_closed",
            TransferError::WorkerPanicked(_) => "internal_error",
        };
        Self::error(code, error.to_string())
    }
}
