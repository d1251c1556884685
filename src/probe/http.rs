//! HTTP probe implementation.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::{Duration, Instant};

use super::{CheckResult, ProbeError};

const ACCEPT_HEADER: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Performs bounded GET requests with a fixed identification header.
#[derive(Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// Build a prober whose requests time out after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| ProbeError::Other(e.to_string()))?;

        Ok(Self { client })
    }

    /// Probe `target` once. Never fails; errors become a failed result.
    pub async fn probe(&self, target: &str) -> CheckResult {
        match self.fetch(target).await {
            Ok((status, elapsed)) => CheckResult::responded(target, status, elapsed),
            Err(e) => CheckResult::failed(target, &e),
        }
    }

    async fn fetch(&self, target: &str) -> Result<(u16, Duration), ProbeError> {
        let url = if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("http://{}", target)
        };

        let start = Instant::now();

        let response = self.client.get(&url).send().await.map_err(classify)?;
        let status = response.status().as_u16();

        // Read the full body to measure complete transfer time
        let _body = response.bytes().await.map_err(classify)?;

        Ok((status, start.elapsed()))
    }
}

fn classify(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else if e.is_connect() {
        ProbeError::Connection
    } else {
        ProbeError::Other(e.to_string())
    }
}
