//! HTTP request handlers.

use super::AppState;
use crate::probe::CheckResult;
use crate::scheduler::TriggerError;
use crate::stats::TargetStatistics;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

const DEFAULT_HISTORY_LIMIT: usize = 50;

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let scheduler = &state.scheduler;
    let snapshot = scheduler.recorder().load_snapshot();

    let target_rows: String = scheduler
        .targets()
        .iter()
        .enumerate()
        .map(|(i, url)| {
            let stats = snapshot.statistics.get(url).cloned().unwrap_or_default();
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td><td>{}</td></tr>",
                i,
                escape(url),
                stats.total_checks,
                stats.uptime_percentage,
                stats
                    .last_check_timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let recent_rows: String = snapshot
        .checks
        .iter()
        .rev()
        .take(10)
        .map(|c| {
            format!(
                "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{:.3}s</td><td>{}</td></tr>",
                c.timestamp.format("%Y-%m-%d %H:%M:%S"),
                escape(&c.target),
                if c.success { "up" } else { "down" },
                c.status_code,
                c.response_time_secs,
                escape(c.error.as_deref().unwrap_or(""))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let log_rows = match scheduler.recorder().log().map(|log| log.count_checks()) {
        Some(Ok(rows)) => format!("{} rows", rows),
        Some(Err(e)) => format!("error ({})", escape(&e.to_string())),
        None => "unavailable".to_string(),
    };

    let page = DASHBOARD_TEMPLATE
        .replace("{{target_count}}", &scheduler.targets().len().to_string())
        .replace("{{interval}}", &scheduler.check_interval().as_secs().to_string())
        .replace(
            "{{monitoring_state}}",
            if scheduler.is_running() { "running" } else { "stopped" },
        )
        .replace("{{log_rows}}", &log_rows)
        .replace("{{target_rows}}", &target_rows)
        .replace("{{recent_rows}}", &recent_rows);

    Html(page)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// API: Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MonitoringInfo {
    pub urls: Vec<String>,
    pub interval: u64,
    /// Seconds until each target is due for its next scheduled check.
    pub next_checks: BTreeMap<String, f64>,
    pub check_counts: BTreeMap<String, u64>,
    pub monitoring_active: bool,
    pub total_checks: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub checks: Vec<CheckResult>,
    pub statistics: BTreeMap<String, TargetStatistics>,
    pub monitoring_info: MonitoringInfo,
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let scheduler = &state.scheduler;
    let snapshot = scheduler.recorder().load_snapshot();
    let now = Utc::now();
    let gate = scheduler.gate();

    let next_checks = scheduler
        .targets()
        .iter()
        .map(|t| {
            let wait = gate.remaining(t, now, scheduler.check_interval());
            (t.clone(), wait.as_secs_f64())
        })
        .collect();

    let check_counts = scheduler
        .targets()
        .iter()
        .map(|t| (t.clone(), gate.check_count(t)))
        .collect();

    Json(StatusResponse {
        checks: snapshot.checks,
        statistics: snapshot.statistics,
        monitoring_info: MonitoringInfo {
            urls: scheduler.targets().to_vec(),
            interval: scheduler.check_interval().as_secs(),
            next_checks,
            check_counts,
            monitoring_active: scheduler.is_running(),
            total_checks: gate.total_checks(),
        },
    })
}

// ============================================================================
// API: Manual checks
// ============================================================================

pub async fn handle_check_now(State(state): State<AppState>) -> Response {
    let manual_secs = state.scheduler.manual_interval().as_secs();

    match state.scheduler.trigger_all(Utc::now()).await {
        Ok(results) => Json(json!({
            "message": format!("Checks completed for {} URLs", results.len()),
            "results": results,
            "next_check_available_in": manual_secs,
        }))
        .into_response(),
        Err(e) => trigger_error_response(e),
    }
}

pub async fn handle_check_url(State(state): State<AppState>, Path(index): Path<i64>) -> Response {
    let count = state.scheduler.targets().len();
    let Ok(index) = usize::try_from(index) else {
        return trigger_error_response(TriggerError::InvalidIndex { index: usize::MAX, count });
    };

    match state.scheduler.trigger_one(index, Utc::now()).await {
        // Non-200 responses are still completed checks
        Ok(result) if result.error.is_none() => Json(json!({
            "message": format!("Check completed for {}", result.target),
            "result": result,
            "next_check_available_in": state.scheduler.manual_interval().as_secs(),
        }))
        .into_response(),
        Ok(result) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "message": format!("Check failed for {}", result.target),
                "error": result.error.clone(),
                "result": result,
            })),
        )
            .into_response(),
        Err(e) => trigger_error_response(e),
    }
}

fn trigger_error_response(err: TriggerError) -> Response {
    match err {
        TriggerError::RateLimited { wait } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": err.to_string(),
                "wait_time": wait.as_secs_f64(),
                "next_check_in": wait.as_secs_f64().ceil(),
            })),
        )
            .into_response(),
        TriggerError::InvalidIndex { .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid URL index" })),
        )
            .into_response(),
    }
}

// ============================================================================
// API: History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

pub async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = match query.limit.as_deref().map(str::parse::<usize>) {
        None => DEFAULT_HISTORY_LIMIT,
        Some(Ok(limit)) => limit,
        Some(Err(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "limit must be a non-negative integer" })),
            )
                .into_response()
        }
    };

    let target = query.url.as_deref().filter(|u| *u != "all");
    Json(state.scheduler.recorder().history(target, limit)).into_response()
}

// ============================================================================
// API: Control
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub action: String,
}

pub async fn handle_control(
    State(state): State<AppState>,
    Json(req): Json<ControlRequest>,
) -> Response {
    let running = match req.action.as_str() {
        "start" => true,
        "stop" => false,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid action. Use 'start' or 'stop'" })),
            )
                .into_response()
        }
    };

    let active = state.scheduler.set_running(running).await;
    let message = if active { "Monitoring started" } else { "Monitoring stopped" };
    Json(json!({ "message": message, "active": active })).into_response()
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub monitoring_active: bool,
    pub urls_configured: usize,
    pub total_checks: u64,
}

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        monitoring_active: state.scheduler.is_running(),
        urls_configured: state.scheduler.targets().len(),
        total_checks: state.scheduler.gate().total_checks(),
    })
}

// ============================================================================
// Debug
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DebugConfigInfo {
    pub http_port: u16,
    pub targets_count: usize,
    pub check_interval: u64,
    pub timeout: f64,
    pub storage_limit: usize,
}

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub version: &'static str,
    pub working_directory: Option<String>,
    pub database_exists: bool,
    pub durable_log_available: bool,
    pub snapshot_exists: bool,
    pub config_info: DebugConfigInfo,
}

/// Read-only deployment diagnostics.
pub async fn handle_debug(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    let recorder = state.scheduler.recorder();

    Json(DebugResponse {
        version: env!("CARGO_PKG_VERSION"),
        working_directory: std::env::current_dir()
            .ok()
            .map(|d| d.display().to_string()),
        database_exists: std::path::Path::new(&config.db_path).exists(),
        durable_log_available: recorder.log().is_some(),
        snapshot_exists: recorder.snapshot_path().exists(),
        config_info: DebugConfigInfo {
            http_port: config.http_port,
            targets_count: config.targets.len(),
            check_interval: config.check_interval.as_secs(),
            timeout: config.timeout.as_secs_f64(),
            storage_limit: config.storage_limit,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::{Recorder, SnapshotFile, Store};
    use crate::probe::HttpProber;
    use crate::scheduler::Scheduler;
    use crate::test_support::TestServer;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn app_state(dir: &TempDir, targets: Vec<String>) -> AppState {
        let config = ServerConfig {
            targets: targets.clone(),
            pace_delay: Duration::ZERO,
            ..Default::default()
        };
        let store = Arc::new(Store::new(dir.path().join("log.db")).unwrap());
        let snapshot = SnapshotFile::new(dir.path().join("snap.json"), 100);
        let recorder = Arc::new(Recorder::new(Some(store), snapshot, targets));
        let prober = HttpProber::new(Duration::from_secs(2), &config.user_agent).unwrap();
        let scheduler = Arc::new(Scheduler::new(&config, prober, recorder));
        AppState { config, scheduler }
    }

    #[tokio::test]
    async fn test_check_url_status_codes() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let state = app_state(
            &dir,
            vec![server.url("/a"), server.url("/down"), TestServer::closed_url()],
        );

        let resp = handle_check_url(State(state.clone()), Path(5)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = handle_check_url(State(state.clone()), Path(-1)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(server.hits(), 0);

        let resp = handle_check_url(State(state.clone()), Path(0)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = handle_check_url(State(state.clone()), Path(0)).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        // A 503 is a completed check and lands in history
        let resp = handle_check_url(State(state.clone()), Path(1)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.scheduler.recorder().history(None, 10).len(), 2);

        // No response at all is a 500 and is not recorded
        let resp = handle_check_url(State(state.clone()), Path(2)).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.scheduler.recorder().history(None, 10).len(), 2);
    }

    #[tokio::test]
    async fn test_check_now_rate_limited() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let state = app_state(&dir, vec![server.url("/a")]);

        let resp = handle_check_now(State(state.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = handle_check_now(State(state.clone())).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_history_rejects_bad_limit() {
        let dir = TempDir::new().unwrap();
        let state = app_state(&dir, vec!["https://a.example".to_string()]);

        let query = HistoryQuery {
            url: Some("all".to_string()),
            limit: Some("ten".to_string()),
        };
        let resp = handle_history(State(state.clone()), Query(query)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let query = HistoryQuery { url: None, limit: None };
        let resp = handle_history(State(state), Query(query)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_control_actions() {
        let dir = TempDir::new().unwrap();
        let state = app_state(&dir, Vec::new());

        let req = ControlRequest { action: "pause".to_string() };
        let resp = handle_control(State(state.clone()), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!state.scheduler.is_running());

        let req = ControlRequest { action: "start".to_string() };
        let resp = handle_control(State(state.clone()), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.scheduler.is_running());

        let req = ControlRequest { action: "stop".to_string() };
        handle_control(State(state.clone()), Json(req)).await;
        assert!(!state.scheduler.is_running());
    }

    #[tokio::test]
    async fn test_debug_reports_storage_and_config() {
        let dir = TempDir::new().unwrap();
        let mut state = app_state(&dir, vec!["https://a.example".to_string()]);
        state.config.db_path = dir.path().join("log.db").display().to_string();

        let resp = handle_debug(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(info["database_exists"], true);
        assert_eq!(info["durable_log_available"], true);
        assert_eq!(info["snapshot_exists"], false);
        assert_eq!(info["config_info"]["targets_count"], 1);
        assert_eq!(info["config_info"]["check_interval"], 300);
    }
}
