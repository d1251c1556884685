//! Persisted model types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::probe::CheckResult;
use crate::stats::TargetStatistics;

/// A row of the durable log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    #[serde(flatten)]
    pub check: CheckResult,
}

/// The snapshot document: retained checks plus statistics derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub checks: Vec<CheckResult>,
    #[serde(default)]
    pub statistics: BTreeMap<String, TargetStatistics>,
}
