//! Vendor device identifiers, grouped by category.
//!
//! Loaded once at startup and shared read-only behind an `Arc`.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::{read_json, ProjectError};

pub const CATEGORIES: &[&str] = &[
    "bitwig_instruments",
    "bitwig_audio_fx",
    "clap_instruments",
    "clap_audio_fx",
    "vst2_instruments",
    "vst2_audio_fx",
    "vst3_instruments",
    "vst3_audio_fx",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("bundled catalog is invalid: {0}")]
    Builtin(#[from] serde_json::Error),
    #[error(transparent)]
    File(#[from] ProjectError),
}

const BUILTIN_CATALOG: &str = include_str!("../resources/device-catalog.json");

/// Category name → (device name → device id), in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCatalog {
    devices: IndexMap<String, IndexMap<String, String>>,
}

impl DeviceCatalog {
    /// The catalog bundled with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Ok(Self::from_json(BUILTIN_CATALOG)?)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        Ok(read_json(path)?)
    }

    pub fn category(&self, name: &str) -> Option<&IndexMap<String, String>> {
        self.devices.get(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, usize)> {
        self.devices.iter().map(|(name, devices)| (name.as_str(), devices.len()))
    }

    /// Look a device up by exact name across every category.
    pub fn find(&self, device_name: &str) -> Option<(&str, &str)> {
        self.devices.iter().find_map(|(category, devices)| {
            devices
                .get(device_name)
                .map(|id| (category.as_str(), id.as_str()))
        })
    }

    pub fn total(&self) -> usize {
        self.devices.values().map(IndexMap::len).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_has_known_categories() {
        let catalog = DeviceCatalog::builtin().unwrap();
        for category in CATEGORIES {
            assert!(catalog.category(category).is_some(), "missing {category}");
        }
        assert!(catalog.total() >= 6);
    }

    #[test]
    fn test_find_by_name() {
        let catalog = DeviceCatalog::builtin().unwrap();
        let (category, id) = catalog.find("EQ+").unwrap();
        assert_eq!(category, "bitwig_audio_fx");
        assert_eq!(id, "e4815188-ba6f-4d14-bcfc-2dcb8f778ccb");
        assert!(catalog.find("eq+").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"devices": {"vst3_audio_fx": {"Pro-Q 3": "abc"}}}"#,
        )
        .unwrap();
        let catalog = DeviceCatalog::load(&path).unwrap();
        assert_eq!(catalog.total(), 1);
        assert_eq!(catalog.categories().collect::<Vec<_>>(), vec![("vst3_audio_fx", 1)]);
    }

    #[test]
    fn test_load_error_keeps_source() {
        use std::error::Error as _;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = DeviceCatalog::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::File(ProjectError::Json(_))));
        assert!(err.source().is_some());
    }
}
