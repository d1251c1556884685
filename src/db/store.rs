//! SQLite durable log implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::LogEntry;
use crate::probe::CheckResult;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe append-only check log.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the log at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append one check and return its row id.
    pub fn append_check(&self, check: &CheckResult) -> Result<i64, DbError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO website_checks (timestamp, url, status_code, response_time, success, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                check.timestamp.format(TIME_FORMAT).to_string(),
                check.target,
                check.status_code,
                check.response_time_secs,
                check.success,
                check.error,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent checks first, optionally restricted to one URL. Rows come
    /// back in append order; stored timestamp text is not comparable across
    /// legacy formats.
    pub fn query_checks(&self, url: Option<&str>, limit: usize) -> Result<Vec<LogEntry>, DbError> {
        let conn = self.conn();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let entries = match url {
            Some(url) => {
                let mut stmt = conn.prepare(
                    "SELECT id, timestamp, url, status_code, response_time, success, error_message
                     FROM website_checks WHERE url = ?1
                     ORDER BY id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![url, limit], entry_from_row)?;
                rows.collect::<SqlResult<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, timestamp, url, status_code, response_time, success, error_message
                     FROM website_checks
                     ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], entry_from_row)?;
                rows.collect::<SqlResult<Vec<_>>>()?
            }
        };

        Ok(entries)
    }

    /// Delete checks recorded before a cutoff. Returns the number removed.
    pub fn delete_checks_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn();
        let removed = conn.execute(
            "DELETE FROM website_checks WHERE datetime(timestamp) < datetime(?1)",
            params![cutoff.format(TIME_FORMAT).to_string()],
        )?;
        Ok(removed)
    }

    /// Total rows in the log.
    pub fn count_checks(&self) -> Result<i64, DbError> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM website_checks", [], |r| r.get(0))?)
    }
}

fn entry_from_row(row: &Row<'_>) -> SqlResult<LogEntry> {
    let time_str: String = row.get(1)?;
    let timestamp = parse_db_time(&time_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unrecognised timestamp {:?}", time_str).into(),
        )
    })?;

    Ok(LogEntry {
        id: row.get(0)?,
        check: CheckResult {
            timestamp,
            target: row.get(2)?,
            status_code: row.get(3)?,
            response_time_secs: row.get(4)?,
            success: row.get(5)?,
            error: row.get(6)?,
        },
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    // Rows written by older deployments use naive ISO-8601
    let formats = [
        TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
