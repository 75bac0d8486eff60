use super::types::{
    DEFAULT_HOST, DEFAULT_INBOX_CAPACITY, DEFAULT_PORT, FramecastConfig, RawFramecastConfig,
    RawServerSection, RawSessionSection, RawTransferSection, ServerSection, SessionSection,
    TransferSection,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use framecast_core::transfer::DEFAULT_FPS;
use std::path::{Path, PathBuf};

/// Environment variables read on top of the config files
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_MAX_QUEUE_SIZE: &str = "MAX_QUEUE_SIZE";
pub const ENV_TIMEOUT: &str = "TIMEOUT";

/// Every environment variable [`ConfigLoader::load`] consults, in merge order
pub const ENV_VARS: [&str; 4] = [ENV_HOST, ENV_PORT, ENV_MAX_QUEUE_SIZE, ENV_TIMEOUT];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<FramecastConfig> {
        let mut raw = RawFramecastConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Layer 3: Environment
        let env = Self::env_overrides(|key| std::env::var(key).ok())?;
        raw = Self::merge_raw(raw, env);

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "framecast").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with FRAMECAST_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("FRAMECAST_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".framecast/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawFramecastConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Read overrides from environment variables through `lookup`
    ///
    /// Unset or empty variables are ignored; unparsable values are errors.
    pub fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> Result<RawFramecastConfig> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = get(ENV_PORT)
            .map(|value| value.trim().parse::<u16>())
            .transpose()
            .with_context(|| format!("{} must be a port number", ENV_PORT))?;
        let max_queue_size = get(ENV_MAX_QUEUE_SIZE)
            .map(|value| value.trim().parse::<usize>())
            .transpose()
            .with_context(|| format!("{} must be a non-negative integer", ENV_MAX_QUEUE_SIZE))?;
        let timeout_secs = get(ENV_TIMEOUT)
            .map(|value| value.trim().parse::<f64>())
            .transpose()
            .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT))?;

        Ok(RawFramecastConfig {
            server: RawServerSection {
                host: get(ENV_HOST),
                port,
            },
            session: RawSessionSection {
                max_queue_size,
                timeout_secs,
                ..Default::default()
            },
            transfer: RawTransferSection::default(),
        })
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    pub fn merge_raw(base: RawFramecastConfig, overlay: RawFramecastConfig) -> RawFramecastConfig {
        RawFramecastConfig {
            server: RawServerSection {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
            },
            session: RawSessionSection {
                max_queue_size: overlay.session.max_queue_size.or(base.session.max_queue_size),
                timeout_secs: overlay.session.timeout_secs.or(base.session.timeout_secs),
                inbox_capacity: overlay.session.inbox_capacity.or(base.session.inbox_capacity),
                backpressure: overlay.session.backpressure.or(base.session.backpressure),
            },
            transfer: RawTransferSection {
                fps: overlay.transfer.fps.or(base.transfer.fps),
                kernel: overlay.transfer.kernel.or(base.transfer.kernel),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawFramecastConfig) -> FramecastConfig {
        FramecastConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
            },
            session: SessionSection {
                max_queue_size: raw.session.max_queue_size.unwrap_or(0),
                timeout_secs: raw.session.timeout_secs.unwrap_or(0.0),
                inbox_capacity: raw.session.inbox_capacity.unwrap_or(DEFAULT_INBOX_CAPACITY),
                backpressure: raw.session.backpressure.unwrap_or_default(),
            },
            transfer: TransferSection {
                fps: raw.transfer.fps.unwrap_or(DEFAULT_FPS),
                kernel: raw.transfer.kernel.unwrap_or_default(),
            },
        }
    }

    /// Load a single config file with defaults applied (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<FramecastConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(FramecastConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_core::{Backpressure, GeneratorKind};
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    // ==================== Load Tests ====================

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config, FramecastConfig::default());
    }

    #[test]
    fn test_load_from_valid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9999

[session]
max_queue_size = 2
timeout_secs = 30

[transfer]
fps = 24
kernel = "invert"
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.session.max_queue_size, 2);
        assert_eq!(config.session.timeout_secs, 30.0);
        assert_eq!(config.session.inbox_capacity, DEFAULT_INBOX_CAPACITY);
        assert_eq!(config.transfer.fps, 24);
        assert_eq!(config.transfer.kernel, GeneratorKind::Invert);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    #[test]
    fn test_load_unknown_kernel_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nkernel = \"diffusion\"\n").unwrap();

        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_merge_raw_overlay_overrides_base() {
        let base = RawFramecastConfig {
            server: RawServerSection {
                host: Some("127.0.0.1".to_string()),
                port: Some(7860),
            },
            session: RawSessionSection {
                max_queue_size: Some(4),
                timeout_secs: Some(60.0),
                inbox_capacity: Some(16),
                backpressure: None,
            },
            transfer: RawTransferSection {
                fps: Some(30),
                kernel: None,
            },
        };

        let overlay = RawFramecastConfig {
            server: RawServerSection {
                host: None,
                port: Some(8080),
            },
            session: RawSessionSection {
                max_queue_size: Some(1),
                ..Default::default()
            },
            transfer: RawTransferSection {
                fps: None,
                kernel: Some(GeneratorKind::Invert),
            },
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.server.host, Some("127.0.0.1".to_string()));
        assert_eq!(merged.server.port, Some(8080));
        assert_eq!(merged.session.max_queue_size, Some(1));
        assert_eq!(merged.session.timeout_secs, Some(60.0));
        assert_eq!(merged.session.inbox_capacity, Some(16));
        assert_eq!(merged.transfer.fps, Some(30));
        assert_eq!(merged.transfer.kernel, Some(GeneratorKind::Invert));
    }

    #[test]
    fn test_finalize_fills_defaults() {
        let config = ConfigLoader::finalize(RawFramecastConfig::default());

        assert_eq!(config, FramecastConfig::default());
        assert_eq!(config.session.backpressure, Backpressure::DropOldest);
    }

    // ==================== Environment Tests ====================

    #[test]
    fn test_env_overrides_parse_known_variables() {
        let raw = ConfigLoader::env_overrides(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("MAX_QUEUE_SIZE", "3"),
            ("TIMEOUT", "2.5"),
        ]))
        .unwrap();

        assert_eq!(raw.server.host, Some("127.0.0.1".to_string()));
        assert_eq!(raw.server.port, Some(9000));
        assert_eq!(raw.session.max_queue_size, Some(3));
        assert_eq!(raw.session.timeout_secs, Some(2.5));
    }

    #[test]
    fn test_env_overrides_ignore_unset_and_empty() {
        let raw = ConfigLoader::env_overrides(lookup(&[("PORT", "  ")])).unwrap();

        assert!(raw.server.host.is_none());
        assert!(raw.server.port.is_none());
        assert!(raw.session.timeout_secs.is_none());
    }

    #[test]
    fn test_env_overrides_reject_garbage() {
        assert!(ConfigLoader::env_overrides(lookup(&[("PORT", "http")])).is_err());
        assert!(ConfigLoader::env_overrides(lookup(&[("MAX_QUEUE_SIZE", "-1")])).is_err());
        assert!(ConfigLoader::env_overrides(lookup(&[("TIMEOUT", "soon")])).is_err());
    }

    #[test]
    fn test_env_layer_wins_over_file_layer() {
        let file = RawFramecastConfig {
            server: RawServerSection {
                host: None,
                port: Some(7000),
            },
            ..Default::default()
        };
        let env = ConfigLoader::env_overrides(lookup(&[("PORT", "7001")])).unwrap();

        let config = ConfigLoader::finalize(ConfigLoader::merge_raw(file, env));

        assert_eq!(config.server.port, 7001);
    }

    // ==================== Path Tests ====================

    #[test]
    fn test_user_config_path_returns_some() {
        let path = ConfigLoader::user_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("framecast"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_path() {
        let path = ConfigLoader::project_config_path();
        assert_eq!(path, PathBuf::from(".framecast/config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_dir_override() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "[session]\nmax_queue_size = 7\n",
        )
        .unwrap();

        // SAFETY: env-mutating tests are serialized
        unsafe {
            std::env::set_var(
                "FRAMECAST_PROJECT_CONFIG_DIR",
                temp_dir.path().to_string_lossy().as_ref(),
            );
        }

        let path = ConfigLoader::project_config_path();
        let config = ConfigLoader::load_from_path(&path);

        unsafe {
            std::env::remove_var("FRAMECAST_PROJECT_CONFIG_DIR");
        }

        assert_eq!(path, temp_dir.path().join("config.toml"));
        assert_eq!(config.unwrap().session.max_queue_size, 7);
    }
}
