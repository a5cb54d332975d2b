use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::ListenerConfig;
use crate::project::{read_json, write_json, ProjectError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 61169;
pub const DEFAULT_RESTART_DELAY_MS: u64 = 500;

const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    File(#[from] ProjectError),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_restart_delay_ms() -> u64 {
    DEFAULT_RESTART_DELAY_MS
}

fn default_true() -> bool {
    true
}

/// Bridge settings stored in the config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSettings {
    pub version: u32,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pause between stopping and re-binding the listener on restart.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Project snapshot loaded into the in-memory studio. None = demo project.
    #[serde(default)]
    pub project_file: Option<PathBuf>,
    /// Append every dispatched command to the JSONL audit log.
    #[serde(default = "default_true")]
    pub audit: bool,
    /// `tracing` filter directive used when no env override is set.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            host: default_host(),
            port: default_port(),
            restart_delay_ms: default_restart_delay_ms(),
            project_file: None,
            audit: true,
            log_filter: None,
        }
    }
}

impl BridgeSettings {
    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig::new(self.host.clone(), self.port)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.host.chars().any(char::is_whitespace) {
            return Err(SettingsError::Invalid {
                field: "host",
                reason: format!("'{}' contains whitespace", self.host),
            });
        }
        if self.restart_delay_ms > 60_000 {
            return Err(SettingsError::Invalid {
                field: "restart_delay_ms",
                reason: "must be at most 60000".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from the config directory. `Ok(None)` if no file exists.
pub fn load_settings(config_dir: &Path) -> Result<Option<BridgeSettings>, SettingsError> {
    let path = crate::paths::settings_path(config_dir);
    if !path.exists() {
        return Ok(None);
    }
    let settings: BridgeSettings = read_json(&path)?;
    settings.validate()?;
    Ok(Some(settings))
}

/// Load settings, falling back to defaults when the file is missing or bad.
pub fn load_or_default(config_dir: &Path) -> BridgeSettings {
    match load_settings(config_dir) {
        Ok(Some(settings)) => settings,
        Ok(None) => BridgeSettings::default(),
        Err(e) => {
            warn!(error = %e, "ignoring unreadable settings, using defaults");
            BridgeSettings::default()
        }
    }
}

/// Save settings to the config directory.
pub fn save_settings(config_dir: &Path, settings: &BridgeSettings) -> Result<(), SettingsError> {
    settings.validate()?;
    std::fs::create_dir_all(config_dir).map_err(ProjectError::from)?;
    write_json(&crate::paths::settings_path(config_dir), settings)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = BridgeSettings::default();
        settings.port = 8090;
        settings.project_file = Some(PathBuf::from("/songs/demo.json"));
        save_settings(dir.path(), &settings).unwrap();

        let loaded = load_settings(dir.path()).unwrap().expect("should load");
        assert_eq!(loaded, settings);
        assert_eq!(loaded.listener_config(), ListenerConfig::new("127.0.0.1", 8090));
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            crate::paths::settings_path(dir.path()),
            r#"{ "version": 1, "port": 9000 }"#,
        )
        .unwrap();
        let loaded = load_settings(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.host, DEFAULT_HOST);
        assert_eq!(loaded.port, 9000);
        assert_eq!(loaded.restart_delay(), Duration::from_millis(DEFAULT_RESTART_DELAY_MS));
        assert!(loaded.audit);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_settings(dir.path()).unwrap().is_none());
        assert_eq!(load_or_default(dir.path()), BridgeSettings::default());
    }

    #[test]
    fn test_invalid_host_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = BridgeSettings {
            host: "  ".to_string(),
            ..BridgeSettings::default()
        };
        let err = save_settings(dir.path(), &settings).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "host", .. }));
    }

    #[test]
    fn test_bad_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(crate::paths::settings_path(dir.path()), "{ nope").unwrap();
        assert!(load_settings(dir.path()).is_err());
        assert_eq!(load_or_default(dir.path()), BridgeSettings::default());
    }
}
