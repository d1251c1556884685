//! Probe module for uptime monitoring.
//!
//! A probe performs one bounded HTTP GET and always yields a [`CheckResult`];
//! failures are classified rather than propagated.

mod http;

pub use http::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Probe failure classification.
///
/// The `Display` form is the `error` string stored with a failed check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,
    #[error("connection")]
    Connection,
    #[error("other:{0}")]
    Other(String),
}

/// The outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// When the probe completed.
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "url")]
    pub target: String,
    /// HTTP status, or 0 when no response was obtained.
    pub status_code: u16,
    #[serde(rename = "response_time")]
    pub response_time_secs: f64,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl CheckResult {
    /// A probe that received a response.
    pub fn responded(target: &str, status_code: u16, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            target: target.to_string(),
            status_code,
            response_time_secs: round_millis(elapsed),
            success: status_code == 200,
            error: None,
        }
    }

    /// A probe that never got a response.
    pub fn failed(target: &str, error: &ProbeError) -> Self {
        Self {
            timestamp: Utc::now(),
            target: target.to_string(),
            status_code: 0,
            response_time_secs: 0.0,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}
