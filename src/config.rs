/// Application configuration
///
/// Loaded from `$CAPTURE_METER_CONFIG`, or `config.toml` in the user's
/// config directory. Every field has a default, so a missing file (or a
/// partial one) is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::state::data::FacingMode;
use crate::state::session::{FileStorage, MemoryStorage, SessionContext};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "CAPTURE_METER_CONFIG";

const APP_DIR: &str = "capture-meter";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin the app is served from; decides the secure-context check
    pub origin: String,
    /// Path opened at start-up
    pub start_path: String,
    pub default_facing: FacingMode,
    pub camera: CameraConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frames for the front-facing camera
    pub front_dir: PathBuf,
    /// Frames for the rear-facing camera
    pub back_dir: PathBuf,
    pub frame_rate: u32,
    pub max_frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    /// Session file; defaults to the user cache dir
    pub path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            start_path: "/".to_string(),
            default_facing: FacingMode::Environment,
            camera: CameraConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        let root = dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join(APP_DIR).join("camera"))
            .unwrap_or_else(|| PathBuf::from("camera"));

        Self {
            front_dir: root.join("front"),
            back_dir: root.join("back"),
            frame_rate: 10,
            max_frames: 120,
        }
    }
}

impl AppConfig {
    /// Load from `$CAPTURE_METER_CONFIG` or the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `<config dir>/capture-meter/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Session context backed by the configured storage
    pub fn session_context(&self) -> SessionContext {
        match self.session.backend {
            SessionBackend::Memory => SessionContext::new(Arc::new(MemoryStorage::new())),
            SessionBackend::File => {
                match self.session.path.clone().or_else(FileStorage::default_path) {
                    Some(path) => SessionContext::new(Arc::new(FileStorage::new(path))),
                    None => {
                        tracing::warn!("No cache directory for session storage, keeping it in memory");
                        SessionContext::in_memory()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.start_path, "/");
        assert_eq!(config.default_facing, FacingMode::Environment);
        assert_eq!(config.camera.frame_rate, 10);
        assert_eq!(config.session.backend, SessionBackend::File);
        assert!(config.camera.back_dir.ends_with("back"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
origin = "https://meters.example.com"
default_facing = "user"

[camera]
front_dir = "/srv/frames/front"

[session]
backend = "memory"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.origin, "https://meters.example.com");
        assert_eq!(config.default_facing, FacingMode::User);
        assert_eq!(config.camera.front_dir, PathBuf::from("/srv/frames/front"));
        assert_eq!(config.camera.max_frames, 120);
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert_eq!(config.start_path, "/");
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_facing = \"sideways\"").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_file_session_backend_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            session: SessionConfig {
                backend: SessionBackend::File,
                path: Some(dir.path().join("session.json")),
            },
            ..AppConfig::default()
        };

        config.session_context().write_username("alice");
        assert_eq!(config.session_context().username().as_deref(), Some("alice"));
        assert!(dir.path().join("session.json").exists());
    }
}
