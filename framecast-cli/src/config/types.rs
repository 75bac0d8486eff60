use std::time::Duration;

use anyhow::{Context, Result, bail};
use framecast_core::{Backpressure, GeneratorKind, TransferConfig, transfer::DEFAULT_FPS};
use framecast_server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Default host for the framecast server
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port for the framecast server
pub const DEFAULT_PORT: u16 = 7860;

/// Longest accepted idle timeout: one year
pub const MAX_TIMEOUT_SECS: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Default per-session inbound queue capacity
pub const DEFAULT_INBOX_CAPACITY: usize = 8;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawFramecastConfig {
    #[serde(default)]
    pub server: RawServerSection,

    #[serde(default)]
    pub session: RawSessionSection,

    #[serde(default)]
    pub transfer: RawTransferSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionSection {
    pub max_queue_size: Option<usize>,
    pub timeout_secs: Option<f64>,
    pub inbox_capacity: Option<usize>,
    pub backpressure: Option<Backpressure>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTransferSection {
    pub fps: Option<u32>,
    pub kernel: Option<GeneratorKind>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FramecastConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub transfer: TransferSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Global cap on connected sessions, 0 for unlimited
    pub max_queue_size: usize,

    /// Idle seconds before a session is closed, 0 to disable
    pub timeout_secs: f64,

    /// Inbound queue capacity per session, 0 for unbounded
    pub inbox_capacity: usize,

    /// Policy when an inbound queue is full
    pub backpressure: Backpressure,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_queue_size: 0,
            timeout_secs: 0.0,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            backpressure: Backpressure::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferSection {
    /// Transfer loop iterations per second
    pub fps: u32,

    /// Kernel applied to every frame
    pub kernel: GeneratorKind,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            kernel: GeneratorKind::default(),
        }
    }
}

impl FramecastConfig {
    /// Build the server configuration, rejecting values the server cannot use
    pub fn to_server_config(&self) -> Result<ServerConfig> {
        let timeout = self.session.timeout_secs;
        if !timeout.is_finite() || timeout < 0.0 {
            bail!("session.timeout_secs must be a non-negative number, got {}", timeout);
        }
        if timeout > MAX_TIMEOUT_SECS {
            bail!(
                "session.timeout_secs must be at most {} (one year), got {}",
                MAX_TIMEOUT_SECS,
                timeout
            );
        }
        let timeout = Duration::try_from_secs_f64(timeout)
            .with_context(|| format!("Invalid session.timeout_secs {}", timeout))?;

        Ok(ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            max_queue_size: self.session.max_queue_size,
            timeout,
            inbox_capacity: self.session.inbox_capacity,
            backpressure: self.session.backpressure,
            transfer: TransferConfig::with_fps(self.transfer.fps),
            kernel: self.transfer.kernel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = FramecastConfig::default();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.session.max_queue_size, 0);
        assert_eq!(config.session.timeout_secs, 0.0);
        assert_eq!(config.session.backpressure, Backpressure::DropOldest);
        assert_eq!(config.transfer.fps, DEFAULT_FPS);
        assert_eq!(config.transfer.kernel, GeneratorKind::Passthrough);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = FramecastConfig {
            server: ServerSection {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            session: SessionSection {
                max_queue_size: 4,
                timeout_secs: 120.0,
                inbox_capacity: 2,
                backpressure: Backpressure::Block {
                    timeout: Duration::from_millis(250),
                },
            },
            transfer: TransferSection {
                fps: 30,
                kernel: GeneratorKind::Invert,
            },
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: FramecastConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[server]
port = 9000

[transfer]
kernel = "invert"
"#;
        let raw: RawFramecastConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.server.port, Some(9000));
        assert!(raw.server.host.is_none());
        assert!(raw.session.max_queue_size.is_none());
        assert_eq!(raw.transfer.kernel, Some(GeneratorKind::Invert));
        assert!(raw.transfer.fps.is_none());
    }

    #[test]
    fn test_raw_config_parses_block_backpressure() {
        let toml_str = r#"
[session.backpressure]
policy = "block"
timeout = 500
"#;
        let raw: RawFramecastConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(
            raw.session.backpressure,
            Some(Backpressure::Block {
                timeout: Duration::from_millis(500)
            })
        );
    }

    #[test]
    fn test_raw_config_empty_uses_none() {
        let raw: RawFramecastConfig = toml::from_str("").unwrap();

        assert!(raw.server.port.is_none());
        assert!(raw.session.timeout_secs.is_none());
        assert!(raw.transfer.kernel.is_none());
    }

    #[test]
    fn test_to_server_config_maps_every_field() {
        let mut config = FramecastConfig::default();
        config.session.max_queue_size = 3;
        config.session.timeout_secs = 1.5;
        config.transfer.fps = 10;
        config.transfer.kernel = GeneratorKind::Invert;

        let server = config.to_server_config().unwrap();

        assert_eq!(server.addr(), format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT));
        assert_eq!(server.max_queue_size, 3);
        assert_eq!(server.timeout, Duration::from_millis(1500));
        assert_eq!(server.transfer.cadence, Duration::from_millis(100));
        assert_eq!(server.kernel, GeneratorKind::Invert);
    }

    #[test]
    fn test_to_server_config_rejects_negative_timeout() {
        let mut config = FramecastConfig::default();
        config.session.timeout_secs = -1.0;

        assert!(config.to_server_config().is_err());
    }

    #[test]
    fn test_to_server_config_rejects_unrepresentable_timeouts() {
        let mut config = FramecastConfig::default();

        for timeout in [1e20, f64::MAX, f64::INFINITY, f64::NAN] {
            config.session.timeout_secs = timeout;
            assert!(config.to_server_config().is_err(), "accepted {timeout}");
        }
    }

    #[test]
    fn test_to_server_config_accepts_max_timeout() {
        let mut config = FramecastConfig::default();
        config.session.timeout_secs = MAX_TIMEOUT_SECS;

        let server = config.to_server_config().unwrap();
        assert_eq!(server.timeout, Duration::from_secs(365 * 24 * 60 * 60));
    }
}
