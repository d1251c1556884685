//! On-demand checks and start/stop control.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::Scheduler;
use crate::probe::CheckResult;

/// Why an on-demand check was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriggerError {
    #[error("rate limited, retry in {:.1}s", .wait.as_secs_f64())]
    RateLimited { wait: Duration },
    #[error("invalid target index {index} ({count} targets configured)")]
    InvalidIndex { index: usize, count: usize },
}

impl Scheduler {
    /// Check every target past the manual-trigger interval, skipping the rest.
    ///
    /// Refused only when no target is eligible; the error carries the
    /// shortest wait. Results, failures included, are recorded.
    pub async fn trigger_all(&self, now: DateTime<Utc>) -> Result<Vec<CheckResult>, TriggerError> {
        let any_due = self
            .targets
            .iter()
            .any(|t| self.gate.is_due(t, now, self.manual_interval));

        if !any_due && !self.targets.is_empty() {
            let wait = self
                .targets
                .iter()
                .map(|t| self.gate.remaining(t, now, self.manual_interval))
                .min()
                .unwrap_or(self.manual_interval);
            return Err(TriggerError::RateLimited { wait });
        }

        Ok(self.check_due(now, self.manual_interval).await)
    }

    /// Check the target at `index` if it is past the manual-trigger interval.
    ///
    /// The attempt always counts against the rate limit. Any HTTP response is
    /// recorded, non-200 included; a check that got no response at all is
    /// only returned to the caller.
    pub async fn trigger_one(&self, index: usize, now: DateTime<Utc>) -> Result<CheckResult, TriggerError> {
        let target = self.targets.get(index).ok_or(TriggerError::InvalidIndex {
            index,
            count: self.targets.len(),
        })?;

        let attempt = self
            .gate
            .try_acquire(target, now, self.manual_interval)
            .map_err(|wait| TriggerError::RateLimited { wait })?;

        tracing::info!("Manual check of {} (check #{})", target, attempt);
        let result = self.prober.probe(target).await;

        match &result.error {
            None => self.recorder.record(&result),
            Some(error) => {
                tracing::warn!("Manual check of {} failed ({}), not recorded", target, error)
            }
        }

        Ok(result)
    }

    /// Start or stop the background loop. Returns the new running state.
    pub async fn set_running(self: &Arc<Self>, running: bool) -> bool {
        if running {
            self.start().await;
        } else {
            self.stop();
        }
        self.is_running()
    }
}
