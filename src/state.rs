use std::path::PathBuf;
use std::sync::Arc;

use crate::bindings::{Bindings, BindingsCell};
use crate::device_catalog::DeviceCatalog;
use crate::registry::ToolRegistry;
use crate::studio::Studio;

// ── Application State ──────────────────────────────────────────────

/// State shared by every listener incarnation and by the headless CLI.
///
/// Built once per process. Restarting the listener never rebuilds it.
pub struct AppState {
    pub registry: ToolRegistry,
    bindings: BindingsCell,
    pub device_catalog: Arc<DeviceCatalog>,
    /// Where command audit lines go. None disables auditing.
    pub audit_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(studio: Arc<dyn Studio>, device_catalog: Arc<DeviceCatalog>) -> Self {
        Self {
            registry: ToolRegistry::builtin(),
            bindings: BindingsCell::new(studio),
            device_catalog,
            audit_dir: None,
        }
    }

    pub fn with_audit_dir(mut self, audit_dir: impl Into<PathBuf>) -> Self {
        self.audit_dir = Some(audit_dir.into());
        self
    }

    /// The process-wide studio bindings, built on first use.
    pub fn bindings(&self) -> Arc<Bindings> {
        self.bindings.get()
    }

    pub fn bindings_build_count(&self) -> usize {
        self.bindings.build_count()
    }
}
