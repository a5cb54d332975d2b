//! Centralized path definitions for config files and directories.
//!
//! Functions take the config directory explicitly so the server, the CLI and
//! tests can all point at different locations.

use std::path::{Path, PathBuf};

// ── Application identity ─────────────────────────────────────────

pub const APP_ID: &str = "studio-bridge";

/// Overrides the platform config directory when set.
pub const CONFIG_DIR_ENV: &str = "STUDIO_BRIDGE_CONFIG_DIR";

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEVICE_CATALOG_FILE: &str = "device-catalog.json";

// ── Directory names ──────────────────────────────────────────────

pub const AUDIT_DIR: &str = "audit";

// ── Config-dir functions (take config_dir) ───────────────────────

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

/// A user-supplied catalog that replaces the bundled one when present.
pub fn device_catalog_path(config_dir: &Path) -> PathBuf {
    config_dir.join(DEVICE_CATALOG_FILE)
}

pub fn audit_dir(config_dir: &Path) -> PathBuf {
    config_dir.join(AUDIT_DIR)
}

// ── Platform defaults ────────────────────────────────────────────

/// `<platform config dir>/studio-bridge`, or `$STUDIO_BRIDGE_CONFIG_DIR`.
/// Falls back to the working directory when the platform has no config dir.
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_ID)
}
