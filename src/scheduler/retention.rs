//! Retention manager for sweeping old rows out of the durable log.

use crate::db::Store;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Manager for deleting durable log rows past their retention age.
pub struct RetentionManager {
    store: Arc<Store>,
    retention: Duration,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Start the retention manager background task.
    pub fn start(&self) {
        let store = self.store.clone();
        let retention = self.retention;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);

            loop {
                interval.tick().await;
                process_retention(&store, retention);
            }
        });
    }
}

fn process_retention(store: &Store, retention: Duration) -> usize {
    // A retention longer than the calendar can express keeps everything
    let Some(cutoff) = ChronoDuration::from_std(retention)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age))
    else {
        return 0;
    };

    match store.delete_checks_before(cutoff) {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!("RetentionManager: Removed {} checks older than {}", removed, cutoff);
            removed
        }
        Err(e) => {
            tracing::error!("RetentionManager: Failed to delete old checks: {}", e);
            0
        }
    }
}
