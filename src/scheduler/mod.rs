//! Scheduler module for running checks and sweeping old data.

mod control;
mod gate;
mod retention;

pub use control::*;
pub use gate::*;
pub use retention::*;

use crate::config::{ServerConfig, MANUAL_TRIGGER_INTERVAL};
use crate::db::Recorder;
use crate::probe::{CheckResult, HttpProber};

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Drives check cycles over the configured targets.
pub struct Scheduler {
    targets: Vec<String>,
    check_interval: Duration,
    manual_interval: Duration,
    pace_delay: Duration,
    gate: RateLimiter,
    prober: HttpProber,
    recorder: Arc<Recorder>,
    /// Checked by the loop once per cycle.
    running: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a stopped scheduler.
    pub fn new(cfg: &ServerConfig, prober: HttpProber, recorder: Arc<Recorder>) -> Self {
        Self {
            targets: cfg.targets.clone(),
            check_interval: cfg.check_interval,
            manual_interval: MANUAL_TRIGGER_INTERVAL,
            pace_delay: cfg.pace_delay,
            gate: RateLimiter::new(),
            prober,
            recorder,
            running: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn manual_interval(&self) -> Duration {
        self.manual_interval
    }

    /// Read-only view of the per-target attempt state.
    pub fn gate(&self) -> &RateLimiter {
        &self.gate
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the background loop unless one is already alive.
    pub async fn start(self: &Arc<Self>) {
        // The loop decides to exit under this same lock, so it either sees the
        // raised flag and carries on or has already cleared its slot
        let mut task = self.task.lock().await;
        self.running.store(true, Ordering::SeqCst);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        tracing::info!(
            "Starting scheduler with {} targets, interval {}s",
            self.targets.len(),
            self.check_interval.as_secs()
        );

        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            this.run_loop().await;
        }));
    }

    /// Ask the loop to exit at its next cycle boundary.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Scheduler stop requested");
        }
    }

    async fn run_loop(&self) {
        while self.keep_running().await {
            let results = self.run_cycle(Utc::now()).await;

            if results.is_empty() {
                tracing::info!("All targets are rate limited, waiting...");
            } else {
                tracing::info!("Completed checks: {} targets", results.len());
            }

            tokio::time::sleep(self.check_interval).await;
        }

        tracing::info!("Background monitoring stopped");
    }

    /// Cycle boundary check. On exit the loop gives up its task slot while
    /// holding the lock `start` takes.
    async fn keep_running(&self) -> bool {
        if self.running.load(Ordering::SeqCst) {
            return true;
        }
        let mut task = self.task.lock().await;
        if self.running.load(Ordering::SeqCst) {
            return true;
        }
        task.take();
        false
    }

    /// One pass over all targets, probing those due under the cycle interval.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Vec<CheckResult> {
        self.check_due(now, self.check_interval).await
    }

    /// Probe, in configuration order, every target due under `interval`,
    /// recording each result. Targets are paced by `pace_delay`.
    async fn check_due(&self, now: DateTime<Utc>, interval: Duration) -> Vec<CheckResult> {
        let mut results = Vec::new();

        for target in &self.targets {
            let attempt = match self.gate.try_acquire(target, now, interval) {
                Ok(attempt) => attempt,
                Err(_) => continue,
            };

            if !results.is_empty() && !self.pace_delay.is_zero() {
                tokio::time::sleep(self.pace_delay).await;
            }

            tracing::info!("Checking {} (check #{})", target, attempt);
            let result = self.prober.probe(target).await;
            log_result(&result);

            self.recorder.record(&result);
            results.push(result);
        }

        results
    }
}

fn log_result(result: &CheckResult) {
    match &result.error {
        Some(e) => tracing::error!("Check failed for {}: {}", result.target, e),
        None if result.success => tracing::info!(
            "Check successful for {}: status {} in {:.3}s",
            result.target,
            result.status_code,
            result.response_time_secs
        ),
        None => tracing::warn!(
            "Check for {} returned status {}",
            result.target,
            result.status_code
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SnapshotFile, Store};
    use crate::test_support::TestServer;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    pub(super) fn scheduler(dir: &TempDir, targets: Vec<String>) -> Arc<Scheduler> {
        scheduler_with_interval(dir, targets, crate::config::MIN_CHECK_INTERVAL)
    }

    fn scheduler_with_interval(
        dir: &TempDir,
        targets: Vec<String>,
        check_interval: Duration,
    ) -> Arc<Scheduler> {
        let cfg = ServerConfig {
            targets: targets.clone(),
            check_interval,
            pace_delay: Duration::ZERO,
            timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let store = Arc::new(Store::new(dir.path().join("log.db")).unwrap());
        let snapshot = SnapshotFile::new(dir.path().join("snap.json"), cfg.storage_limit);
        let recorder = Arc::new(Recorder::new(Some(store), snapshot, targets));
        let prober = HttpProber::new(cfg.timeout, &cfg.user_agent).unwrap();
        Arc::new(Scheduler::new(&cfg, prober, recorder))
    }

    #[tokio::test]
    async fn test_cycle_probes_due_targets_in_order() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let targets = vec![server.url("/b"), server.url("/a"), server.url("/down")];
        let sched = scheduler(&dir, targets.clone());

        let results = sched.run_cycle(Utc::now()).await;
        assert_eq!(server.paths(), vec!["/b", "/a", "/down"]);
        assert_eq!(
            results.iter().map(|r| r.target.clone()).collect::<Vec<_>>(),
            targets
        );
        assert!(!results[2].success);

        // Failures flow through the same record path
        let snapshot = sched.recorder().load_snapshot();
        assert_eq!(snapshot.checks.len(), 3);
        assert_eq!(snapshot.statistics[&targets[2]].uptime_percentage, 0.0);
        assert_eq!(sched.gate().total_checks(), 3);
    }

    #[tokio::test]
    async fn test_second_cycle_skips_targets_not_due() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let (a, b) = (server.url("/a"), server.url("/b"));
        let sched = scheduler(&dir, vec![a.clone(), b.clone()]);
        let t0 = Utc::now();

        assert_eq!(sched.run_cycle(t0).await.len(), 2);
        assert_eq!(sched.recorder().history(None, 10).len(), 2);

        assert!(sched.run_cycle(t0 + ChronoDuration::seconds(10)).await.is_empty());
        assert_eq!(server.hits(), 2);

        // A manual check 31 seconds later goes through and moves the shared timestamp
        let manual_at = t0 + ChronoDuration::seconds(31);
        let result = sched.trigger_one(0, manual_at).await.unwrap();
        assert!(result.success);
        assert_eq!(sched.gate().state(&a).last_check_at, Some(manual_at));
        assert_eq!(server.hits(), 3);

        // B is due again after the full interval; A is not, it was checked later
        let results = sched.run_cycle(t0 + ChronoDuration::seconds(300)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, b);
    }

    #[tokio::test]
    async fn test_cycle_with_nothing_due_completes() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let sched = scheduler(&dir, vec![server.url("/a")]);
        let t0 = Utc::now();

        sched.run_cycle(t0).await;
        let results = sched.run_cycle(t0 + ChronoDuration::seconds(1)).await;
        assert!(results.is_empty());
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_cooperative() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let sched = scheduler(&dir, vec![server.url("/a"), server.url("/b")]);

        sched.start().await;
        sched.start().await;
        assert!(sched.is_running());

        for _ in 0..50 {
            if sched.gate().total_checks() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sched.gate().total_checks(), 2);
        assert_eq!(server.hits(), 2);

        sched.stop();
        assert!(!sched.is_running());
        // The loop is asleep until its next cycle; stopping does not abort it
        let task = sched.task.lock().await;
        assert!(task.as_ref().is_some_and(|t| !t.is_finished()));
    }

    async fn wait_for_checks(sched: &Scheduler, at_least: u64) {
        for _ in 0..100 {
            if sched.gate().total_checks() >= at_least {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no more than {} checks", sched.gate().total_checks());
    }

    #[tokio::test]
    async fn test_restart_after_loop_exits() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let sched = scheduler_with_interval(&dir, vec![server.url("/a")], Duration::from_millis(50));

        sched.start().await;
        wait_for_checks(&sched, 1).await;
        sched.stop();

        // The loop releases its slot once it reaches a cycle boundary
        for _ in 0..100 {
            if sched.task.lock().await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sched.task.lock().await.is_none());

        let stopped_at = sched.gate().total_checks();
        sched.start().await;
        assert!(sched.is_running());
        wait_for_checks(&sched, stopped_at + 2).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_start_at_cycle_boundary_keeps_one_loop() {
        let server = TestServer::spawn().await;
        let dir = TempDir::new().unwrap();
        let sched = scheduler_with_interval(&dir, vec![server.url("/a")], Duration::from_millis(5));

        sched.start().await;
        for i in 0..200u64 {
            sched.stop();
            tokio::time::sleep(Duration::from_micros(i * 50)).await;
            sched.start().await;
        }
        assert!(sched.is_running());

        // Whatever the interleaving, a loop is alive and still checking
        let before = sched.gate().total_checks();
        wait_for_checks(&sched, before + 3).await;
        let task = sched.task.lock().await;
        assert!(task.as_ref().is_some_and(|t| !t.is_finished()));
    }
}
