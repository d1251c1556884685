//! Uptrail - uptime monitoring for a fixed set of URLs.
//!
//! Probes each target on a rate-limited cycle, keeps an append-only SQLite
//! log plus a bounded JSON snapshot, and serves status over HTTP.

mod config;
mod db;
mod probe;
mod scheduler;
mod stats;
mod web;

#[cfg(test)]
mod test_support;

use config::ServerConfig;
use db::{Recorder, SnapshotFile, Store};
use probe::HttpProber;
use scheduler::{RetentionManager, Scheduler};
use web::Server;

use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("uptrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Uptrail on port {}...", cfg.http_port);
    if cfg.targets.is_empty() {
        tracing::warn!("No targets configured, set UPTRAIL_TARGETS");
    }
    for (i, url) in cfg.targets.iter().enumerate() {
        tracing::info!("Target {}: {}", i, url);
    }

    ensure_parent_dir(&cfg.db_path)?;
    ensure_parent_dir(&cfg.snapshot_path)?;

    // The snapshot alone keeps the engine usable without the durable log
    let store = match Store::new(&cfg.db_path) {
        Ok(store) => {
            tracing::info!("Durable log at {}", cfg.db_path);
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::error!("Durable log {} unavailable: {}", cfg.db_path, e);
            None
        }
    };

    let snapshot = SnapshotFile::new(&cfg.snapshot_path, cfg.storage_limit);
    tracing::info!(
        "Snapshot at {} (keeping {} checks)",
        snapshot.path().display(),
        cfg.storage_limit
    );
    let recorder = Arc::new(Recorder::new(store.clone(), snapshot, cfg.targets.clone()));
    let prober = HttpProber::new(cfg.timeout, &cfg.user_agent)?;

    // First cycle runs immediately and doubles as the initial check
    let scheduler = Arc::new(Scheduler::new(&cfg, prober, recorder));
    scheduler.start().await;

    if let Some(store) = store {
        RetentionManager::new(store, cfg.log_retention).start();
    }

    let server = Server::new(cfg, scheduler);
    server.start().await?;

    Ok(())
}

fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}
