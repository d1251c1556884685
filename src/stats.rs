//! Per-target uptime statistics derived from retained history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::probe::CheckResult;

/// Counters for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetStatistics {
    pub total_checks: usize,
    pub successful_checks: usize,
    /// Rounded to two decimals; 0 when there are no checks.
    pub uptime_percentage: f64,
    #[serde(rename = "last_check")]
    pub last_check_timestamp: Option<DateTime<Utc>>,
}

/// Recompute statistics for every configured target.
///
/// Results for URLs that are no longer configured are ignored.
pub fn recompute(history: &[CheckResult], targets: &[String]) -> BTreeMap<String, TargetStatistics> {
    let mut stats: BTreeMap<String, TargetStatistics> = targets
        .iter()
        .map(|t| (t.clone(), TargetStatistics::default()))
        .collect();

    for check in history {
        let Some(entry) = stats.get_mut(&check.target) else {
            continue;
        };
        entry.total_checks += 1;
        if check.success {
            entry.successful_checks += 1;
        }
        // History is insertion-ordered, so the last one seen is the latest
        entry.last_check_timestamp = Some(check.timestamp);
    }

    for entry in stats.values_mut() {
        entry.uptime_percentage = uptime_percentage(entry.successful_checks, entry.total_checks);
    }

    stats
}

/// `round(successful / total * 100, 2)`, or 0 for no checks.
pub fn uptime_percentage(successful: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = successful as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
