//! Write path into both sinks and the read path for history.

use std::path::Path;
use std::sync::Arc;

use super::models::Snapshot;
use super::snapshot::SnapshotFile;
use super::store::Store;
use crate::probe::CheckResult;

/// Facade over the durable log and the snapshot.
///
/// The two writes are independent: a failure in one never blocks the other,
/// and neither is reported to the caller.
pub struct Recorder {
    log: Option<Arc<Store>>,
    snapshot: SnapshotFile,
    targets: Vec<String>,
}

impl Recorder {
    /// `log` is `None` when the durable log could not be opened.
    pub fn new(log: Option<Arc<Store>>, snapshot: SnapshotFile, targets: Vec<String>) -> Self {
        Self {
            log,
            snapshot,
            targets,
        }
    }

    pub fn log(&self) -> Option<&Store> {
        self.log.as_deref()
    }

    /// Persist a check to both sinks.
    pub fn record(&self, check: &CheckResult) {
        if let Some(log) = &self.log {
            if let Err(e) = log.append_check(check) {
                tracing::error!("Failed to save {} to durable log: {}", check.target, e);
            }
        }

        if let Err(e) = self.snapshot.append(check, &self.targets) {
            tracing::error!("Failed to save {} to snapshot: {}", check.target, e);
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        self.snapshot.path()
    }

    pub fn load_snapshot(&self) -> Snapshot {
        self.snapshot.load()
    }

    /// Most recent checks first, from the durable log when it is reachable,
    /// otherwise from the snapshot with the same filter and limit.
    pub fn history(&self, target: Option<&str>, limit: usize) -> Vec<CheckResult> {
        if let Some(log) = &self.log {
            match log.query_checks(target, limit) {
                Ok(entries) => return entries.into_iter().map(|e| e.check).collect(),
                Err(e) => tracing::error!("Durable log query failed, using snapshot: {}", e),
            }
        }

        self.snapshot
            .load()
            .checks
            .into_iter()
            .rev()
            .filter(|c| target.map_or(true, |t| c.target == t))
            .take(limit)
            .collect()
    }
}
