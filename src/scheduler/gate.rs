//! Per-target rate limiting shared by scheduled and on-demand checks.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Attempt bookkeeping for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// Last attempted check, successful or not.
    pub last_check_at: Option<DateTime<Utc>>,
    pub check_count: u64,
}

/// Owns the per-target state. Callers outside the scheduler get read access only.
#[derive(Debug, Default)]
pub struct RateLimiter {
    states: Mutex<HashMap<String, RateLimitState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, RateLimitState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A target is due once `min_interval` has elapsed since its last attempt.
    /// Never-checked targets are always due.
    pub fn is_due(&self, target: &str, now: DateTime<Utc>, min_interval: Duration) -> bool {
        self.remaining(target, now, min_interval).is_zero()
    }

    /// Time left before the target becomes due; zero when it already is.
    pub fn remaining(&self, target: &str, now: DateTime<Utc>, min_interval: Duration) -> Duration {
        let state = self.states().get(target).copied().unwrap_or_default();
        remaining_for(&state, now, min_interval)
    }

    pub fn state(&self, target: &str) -> RateLimitState {
        self.states().get(target).copied().unwrap_or_default()
    }

    pub fn check_count(&self, target: &str) -> u64 {
        self.state(target).check_count
    }

    /// Attempts across all targets.
    pub fn total_checks(&self) -> u64 {
        self.states().values().map(|s| s.check_count).sum()
    }

    /// `is_due` and, when due, mark the attempt at `now`, under one lock so two
    /// callers cannot both dispatch the same target. Returns the attempt
    /// number, or the wait left on refusal.
    pub(super) fn try_acquire(
        &self,
        target: &str,
        now: DateTime<Utc>,
        min_interval: Duration,
    ) -> Result<u64, Duration> {
        let mut states = self.states();
        let state = states.entry(target.to_string()).or_default();
        let wait = remaining_for(state, now, min_interval);
        if !wait.is_zero() {
            return Err(wait);
        }
        Ok(mark(state, now))
    }
}

fn remaining_for(state: &RateLimitState, now: DateTime<Utc>, min_interval: Duration) -> Duration {
    let Some(last) = state.last_check_at else {
        return Duration::ZERO;
    };
    // A clock stepping backwards counts as no time elapsed
    let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
    min_interval.saturating_sub(elapsed)
}

fn mark(state: &mut RateLimitState, now: DateTime<Utc>) -> u64 {
    state.last_check_at = Some(match state.last_check_at {
        Some(last) if last > now => last,
        _ => now,
    });
    state.check_count += 1;
    state.check_count
}
