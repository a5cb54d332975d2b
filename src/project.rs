use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::studio::memory::ProjectSnapshot;

/// Project file format version.
const PROJECT_VERSION: u32 = 1;

// ── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid project: {0}")]
    InvalidProject(String),
}

// ── File envelope ───────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    project: ProjectSnapshot,
}

// ── Atomic JSON I/O ─────────────────────────────────────────────────

/// Per-file mutex map to serialize concurrent writes to the same path.
static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Write bytes via a `.tmp` sibling, keep the previous file as `.bak`, then
/// rename into place. Writers to the same path are serialized.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ProjectError> {
    let lock = FILE_LOCKS
        .lock()
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    let _guard = lock.lock();

    let file_name = path.file_name().unwrap_or_default();

    let mut tmp_name = OsString::from(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);

    let mut bak_name = OsString::from(file_name);
    bak_name.push(".bak");
    let bak_path = path.with_file_name(&bak_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    // Backup is best-effort
    if path.exists() {
        let _ = fs::rename(path, &bak_path);
    }

    fs::rename(&tmp_path, path)?;

    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProjectError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

// ── Save / Load ─────────────────────────────────────────────────────

/// Save a project snapshot for the in-memory studio.
pub fn save_project(path: &Path, project: &ProjectSnapshot) -> Result<(), ProjectError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_json(
        path,
        &ProjectFile {
            version: PROJECT_VERSION,
            project: project.clone(),
        },
    )
}

/// Load a project snapshot, rejecting files written by a newer format.
pub fn load_project(path: &Path) -> Result<ProjectSnapshot, ProjectError> {
    let file: ProjectFile = read_json(path)?;
    if file.version > PROJECT_VERSION {
        return Err(ProjectError::InvalidProject(format!(
            "project file version {} is newer than supported version {PROJECT_VERSION}",
            file.version
        )));
    }
    if file.project.name.trim().is_empty() {
        return Err(ProjectError::InvalidProject("project name is empty".to_string()));
    }
    Ok(file.project)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::demo::demo_project;

    #[test]
    fn save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects").join("demo.json");
        let project = demo_project();
        save_project(&path, &project).unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.name, project.name);
        assert_eq!(loaded.tracks.len(), project.tracks.len());
        assert_eq!(loaded.tracks[2].name, "Drums");
        assert_eq!(loaded.selection.track, Some(2));
    }

    #[test]
    fn second_save_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.json");
        let mut project = demo_project();
        save_project(&path, &project).unwrap();
        project.name = "Renamed".to_string();
        save_project(&path, &project).unwrap();

        assert_eq!(load_project(&path).unwrap().name, "Renamed");
        assert!(dir.path().join("song.json.bak").exists());
        assert!(!dir.path().join("song.json.tmp").exists());
    }

    #[test]
    fn future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        let json = serde_json::json!({
            "version": PROJECT_VERSION + 1,
            "project": { "name": "From the future" }
        });
        fs::write(&path, json.to_string()).unwrap();
        let err = load_project(&path).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidProject(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_project(&path).unwrap_err(), ProjectError::Json(_)));
    }
}
