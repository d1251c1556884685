//! Configuration module for Uptrail.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Shortest cycle interval the scheduler accepts.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Minimum spacing between on-demand checks of the same target.
pub const MANUAL_TRIGGER_INTERVAL: Duration = Duration::from_secs(30);

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 5000)
    pub http_port: u16,
    /// Path to the SQLite durable log (default: "data/tracking.db")
    pub db_path: String,
    /// Path to the JSON snapshot (default: "data/tracking_data.json")
    pub snapshot_path: String,
    /// Monitored URLs, in probing order
    pub targets: Vec<String>,
    /// Cycle interval; never below `MIN_CHECK_INTERVAL`
    pub check_interval: Duration,
    /// Per-probe network timeout
    pub timeout: Duration,
    /// Outbound `User-Agent`
    pub user_agent: String,
    /// Max checks retained in the snapshot
    pub storage_limit: usize,
    /// Delay between two targets probed in the same cycle
    pub pace_delay: Duration,
    /// Age after which durable log rows are swept
    pub log_retention: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 5000,
            db_path: "data/tracking.db".to_string(),
            snapshot_path: "data/tracking_data.json".to_string(),
            targets: Vec::new(),
            check_interval: MIN_CHECK_INTERVAL,
            timeout: Duration::from_secs(10),
            user_agent: "EthicalMultiMonitor/1.0".to_string(),
            storage_limit: 1000,
            pace_delay: Duration::from_secs(1),
            log_retention: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPTRAIL_HTTP_PORT`: HTTP port (default: 5000)
    /// - `UPTRAIL_DB_PATH`: durable log path
    /// - `UPTRAIL_SNAPSHOT_PATH`: snapshot file path
    /// - `UPTRAIL_TARGETS`: comma-separated URLs
    /// - `UPTRAIL_CHECK_INTERVAL`: cycle interval in seconds (floor 300)
    /// - `UPTRAIL_TIMEOUT`: probe timeout in seconds
    /// - `UPTRAIL_USER_AGENT`: outbound identification string
    /// - `UPTRAIL_STORAGE_LIMIT`: snapshot retention cap
    /// - `UPTRAIL_PACE_DELAY_MS`: delay between targets in one cycle
    /// - `UPTRAIL_LOG_RETENTION_DAYS`: durable log retention
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parsed(&lookup, "UPTRAIL_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("UPTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(snapshot_path) = lookup("UPTRAIL_SNAPSHOT_PATH") {
            cfg.snapshot_path = snapshot_path;
        }

        if let Some(raw) = lookup("UPTRAIL_TARGETS") {
            cfg.targets = parse_targets(&raw);
        }

        if let Some(secs) = parsed::<u64, _>(&lookup, "UPTRAIL_CHECK_INTERVAL") {
            let requested = Duration::from_secs(secs);
            if requested < MIN_CHECK_INTERVAL {
                tracing::warn!(
                    "Check interval {}s is below the {}s floor, using the floor",
                    secs,
                    MIN_CHECK_INTERVAL.as_secs()
                );
            }
            cfg.check_interval = requested.max(MIN_CHECK_INTERVAL);
        }

        if let Some(secs) = parsed::<f64, _>(&lookup, "UPTRAIL_TIMEOUT") {
            match Duration::try_from_secs_f64(secs) {
                Ok(timeout) if !timeout.is_zero() => cfg.timeout = timeout,
                _ => tracing::warn!("Ignoring out of range UPTRAIL_TIMEOUT={}", secs),
            }
        }

        if let Some(user_agent) = lookup("UPTRAIL_USER_AGENT") {
            cfg.user_agent = user_agent;
        }

        if let Some(limit) = parsed::<usize, _>(&lookup, "UPTRAIL_STORAGE_LIMIT") {
            if limit > 0 {
                cfg.storage_limit = limit;
            }
        }

        if let Some(ms) = parsed(&lookup, "UPTRAIL_PACE_DELAY_MS") {
            cfg.pace_delay = Duration::from_millis(ms);
        }

        if let Some(days) = parsed::<u64, _>(&lookup, "UPTRAIL_LOG_RETENTION_DAYS") {
            match days.checked_mul(24 * 60 * 60) {
                Some(secs) => cfg.log_retention = Duration::from_secs(secs),
                None => tracing::warn!("Ignoring out of range UPTRAIL_LOG_RETENTION_DAYS={}", days),
            }
        }

        cfg
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

/// Split a comma-separated URL list, dropping blanks and repeats.
fn parse_targets(raw: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for url in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if targets.iter().any(|t| t == url) {
            tracing::warn!("Dropping duplicate target {}", url);
            continue;
        }
        targets.push(url.to_string());
    }
    targets
}
