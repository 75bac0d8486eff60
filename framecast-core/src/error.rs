//! Error types for framecast-core

use thiserror::Error;

use crate::session::SessionId;
use crate::texture::TextureHandle;

/// Top-level error type for framecast-core
#[derive(Error, Debug)]
pub enum FramecastError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Errors from the session registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Admission rejected because the concurrency cap is reached
    #[error("Server is full: {current} of {limit} sessions in use")]
    ServerFull { current: usize, limit: usize },

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session already connected: {0}")]
    AlreadyConnected(SessionId),

    /// The peer is gone; the caller should run disconnect cleanup
    #[error("Channel closed for session {0}")]
    ChannelClosed(SessionId),

    #[error("Send to session {0} timed out")]
    SendTimeout(SessionId),
}

/// Errors from transfer reconfiguration
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid geometry {width}x{height}: width and height must be positive")]
    InvalidGeometry { width: u32, height: u32 },

    /// The source handle could not be opened; the previous configuration is kept
    #[error("Failed to import texture {handle}: {source}")]
    TextureImportFailed {
        handle: TextureHandle,
        #[source]
        source: TextureError,
    },

    #[error("Failed to create {width}x{height} output texture: {source}")]
    TextureCreateFailed {
        width: u32,
        height: u32,
        #[source]
        source: TextureError,
    },

    /// The session's transfer state was torn down
    #[error("Transfer state for session {0} is closed")]
    SessionClosed(SessionId),

    #[error("Transfer worker for session {0} panicked")]
    WorkerPanicked(SessionId),
}

/// Errors from the shared-texture capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("Unknown texture handle: {0}")]
    UnknownHandle(TextureHandle),

    /// Scoped access is non-reentrant
    #[error("Texture {0} is already locked")]
    Busy(TextureHandle),

    #[error("Texture {0} accessed outside of a scoped lock")]
    NotLocked(TextureHandle),

    #[error("Size mismatch: texture holds {expected} bytes, buffer holds {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Allocation failed: {0}")]
    Allocation(String),
}

/// Errors from the compute kernel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Kernel failed: {0}")]
    Failed(String),

    #[error("Invalid kernel input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn registry_error_server_full_displays_counts() {
        let error = RegistryError::ServerFull {
            current: 2,
            limit: 2,
        };
        assert!(error.to_string().contains("Server is full"));
        assert!(error.to_string().contains("2 of 2"));
    }

    #[test]
    fn registry_error_not_found_displays_id() {
        let id = SessionId(Uuid::nil());
        let error = RegistryError::SessionNotFound(id);
        assert!(error.to_string().contains("Session not found"));
        assert!(error.to_string().contains(&Uuid::nil().to_string()));
    }

    #[test]
    fn transfer_error_invalid_geometry_displays_size() {
        let error = TransferError::InvalidGeometry {
            width: 0,
            height: 64,
        };
        assert!(error.to_string().contains("0x64"));
    }

    #[test]
    fn transfer_error_import_failed_keeps_source() {
        let error = TransferError::TextureImportFailed {
            handle: 42,
            source: TextureError::UnknownHandle(42),
        };
        assert!(error.to_string().contains("Failed to import texture 42"));
        let source = std::error::Error::source(&error).map(|s| s.to_string());
        assert_eq!(source, Some("Unknown texture handle: 42".to_string()));
    }

    #[test]
    fn texture_error_size_mismatch_displays_correctly() {
        let error = TextureError::SizeMismatch {
            expected: 16,
            actual: 8,
        };
        assert!(error.to_string().contains("16"));
        assert!(error.to_string().contains("8"));
    }

    #[test]
    fn framecast_error_converts_from_registry_error() {
        let error: FramecastError = RegistryError::SessionNotFound(SessionId(Uuid::nil())).into();
        assert!(matches!(error, FramecastError::Registry(_)));
        assert!(error.to_string().contains("Registry error"));
    }

    #[test]
    fn framecast_error_converts_from_kernel_error() {
        let error: FramecastError = KernelError::Failed("oom".to_string()).into();
        assert!(matches!(error, FramecastError::Kernel(_)));
    }
}
