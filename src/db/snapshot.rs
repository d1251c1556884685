//! Bounded JSON snapshot of recent checks.

use chrono::Utc;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::models::Snapshot;
use crate::probe::CheckResult;
use crate::stats;

/// Snapshot error types.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The snapshot file and its retention cap.
///
/// Appends are an unlocked read-modify-write of the whole file; two writers
/// finishing together can lose one update, but never the retained history.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    capacity: usize,
}

impl SnapshotFile {
    pub fn new<P: Into<PathBuf>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot for readers. Missing or unreadable files read as empty.
    pub fn load(&self) -> Snapshot {
        match self.read() {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                tracing::error!("Error loading snapshot {}: {}", self.path.display(), e);
                Snapshot::default()
            }
        }
    }

    /// Append a check, evict the oldest beyond the cap, refresh statistics, persist.
    pub fn append(&self, check: &CheckResult, targets: &[String]) -> Result<(), SnapshotError> {
        let mut snapshot = match self.read() {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(SnapshotError::Json(e)) => {
                let backup = self.back_up()?;
                tracing::warn!(
                    "Snapshot {} is corrupt ({}), moved to {} and starting empty",
                    self.path.display(),
                    e,
                    backup.display()
                );
                Snapshot::default()
            }
            Err(e) => return Err(e),
        };

        snapshot.checks.push(check.clone());
        if snapshot.checks.len() > self.capacity {
            let excess = snapshot.checks.len() - self.capacity;
            snapshot.checks.drain(..excess);
        }
        snapshot.statistics = stats::recompute(&snapshot.checks, targets);

        self.write(&snapshot)
    }

    fn read(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Each writer stages into its own temp file next to the target, so a
    /// rename only ever publishes a complete document.
    fn write(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn back_up(&self) -> Result<PathBuf, SnapshotError> {
        let backup = self.sibling(&format!("{}.bak", Utc::now().format("%Y%m%d%H%M%S%.3f")));
        fs::rename(&self.path, &backup)?;
        Ok(backup)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}
