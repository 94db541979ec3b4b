// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rep_adapters::{FakeHealthChecker, FakeLockCoordinator, LockCall};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }

    /// Lines containing every given fragment
    fn lines_with(&self, fragments: &[&str]) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| fragments.iter().all(|f| line.contains(f)))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test body with captured tracing output
fn with_tracing<F, Fut>(f: F) -> Fut::Output
where
    F: FnOnce(CapturedLogs) -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f(logs.clone()))
    })
}

/// Poll until `cond` holds, failing after `WAIT_LIMIT`
async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Assert `cond` holds for the whole of `period`
async fn consistently(what: &str, period: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + period;
    while tokio::time::Instant::now() < deadline {
        assert!(cond(), "expected {} to keep holding", what);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

struct Harness {
    health: FakeHealthChecker,
    locks: FakeLockCoordinator,
    interval: HeartbeatInterval,
}

impl Harness {
    fn new(interval_ms: u64) -> Self {
        Self {
            health: FakeHealthChecker::new(),
            locks: FakeLockCoordinator::new(),
            interval: HeartbeatInterval::from_millis(interval_ms).unwrap(),
        }
    }

    fn record() -> PresenceRecord {
        PresenceRecord::new("executor-id", "lucid64")
    }

    fn maintainer(&self) -> PresenceMaintainer<FakeHealthChecker, FakeLockCoordinator> {
        PresenceMaintainer::new(
            Self::record(),
            self.health.clone(),
            self.locks.clone(),
            self.interval,
        )
    }

    async fn start(&self) -> MaintainerProcess {
        self.maintainer().start().await.unwrap()
    }

    /// Deliver a renewal status on the given generation's stream
    async fn deliver(&self, generation: usize, status: bool) {
        let sender = self.locks.status_sender(generation).unwrap();
        tokio::time::timeout(WAIT_LIMIT, sender.send(status))
            .await
            .unwrap()
            .unwrap();
    }

    fn checks(&self) -> usize {
        self.health.check_count()
    }

    /// Drive a started maintainer into recovery via a failed health check
    async fn fail_into_recovery(&self, process: &MaintainerProcess) {
        self.health.set_unhealthy("bam");
        let before = self.checks();
        self.deliver(1, true).await;
        eventually("failed check", || self.checks() == before + 1).await;
        eventually("recovering", || process.phase() == Phase::Recovering).await;
    }

    fn interval(&self) -> Duration {
        self.interval.as_duration()
    }
}

async fn stop_and_wait(process: MaintainerProcess) {
    process.stop();
    tokio::time::timeout(WAIT_LIMIT, process.wait())
        .await
        .unwrap()
        .unwrap();
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn registers_once_before_any_health_check() {
    let h = Harness::new(500);
    let process = h.start().await;

    assert_eq!(h.locks.maintain_count(), 1);
    assert_eq!(
        h.locks.maintain_args(0),
        Some((h.interval, Harness::record()))
    );
    assert_eq!(h.checks(), 0);
    assert_eq!(
        process.status(),
        MaintainerStatus {
            phase: Phase::Tracking,
            generation: 1
        }
    );
    assert!(process.is_running());

    stop_and_wait(process).await;
}

#[tokio::test]
async fn initial_registration_failure_is_fatal() {
    let h = Harness::new(500);
    h.locks.set_maintain_error(Some("store down"));

    let result = h.maintainer().start().await;

    assert!(matches!(result, Err(MaintainError::Registration(_))));
    assert_eq!(h.locks.maintain_count(), 1);
    tokio::time::sleep(h.interval() * 2).await;
    assert_eq!(h.checks(), 0);
    assert_eq!(h.locks.maintain_count(), 1);
}

// =============================================================================
// Tracking
// =============================================================================

#[tokio::test]
async fn checks_health_on_each_renewal() {
    let h = Harness::new(500);
    let process = h.start().await;

    h.deliver(1, true).await;
    eventually("first check", || h.checks() == 1).await;

    h.deliver(1, true).await;
    eventually("second check", || h.checks() == 2).await;

    assert_eq!(process.phase(), Phase::Tracking);
    assert_eq!(h.locks.release_count(), 0);

    stop_and_wait(process).await;
}

#[test]
fn failed_renewal_logs_lost_lock_and_keeps_running() {
    with_tracing(|logs| async move {
        let h = Harness::new(50);
        let process = h.start().await;

        h.deliver(1, false).await;
        eventually("lost-lock log", || {
            !logs.lines_with(&["ERROR", "lost-lock"]).is_empty()
        })
        .await;

        let line = &logs.lines_with(&["ERROR", "lost-lock"])[0];
        assert!(line.contains("executor-id"), "missing executor id: {}", line);

        consistently("running without checks", h.interval() * 4, || {
            process.is_running() && h.checks() == 0
        })
        .await;
        assert_eq!(process.phase(), Phase::Tracking);
        assert_eq!(h.locks.release_count(), 0);

        // Same stream keeps driving checks
        h.deliver(1, true).await;
        eventually("check after lost lock", || h.checks() == 1).await;

        stop_and_wait(process).await;
    });
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test]
async fn health_failure_releases_presence_and_abandons_stream() {
    let h = Harness::new(500);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;

    assert_eq!(h.locks.release_count(), 1);
    assert_eq!(h.locks.held_count(), 0);

    // The superseded stream is no longer consumed
    let old = h.locks.status_sender(1).unwrap();
    eventually("old stream closed", || old.is_closed()).await;
    assert!(old.send(true).await.is_err());
    assert_eq!(h.checks(), 1);

    stop_and_wait(process).await;
}

#[tokio::test]
async fn retries_health_check_on_timer_while_recovering() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;

    eventually("second check", || h.checks() == 2).await;
    eventually("third check", || h.checks() == 3).await;
    eventually("many checks", || h.checks() >= 6).await;

    assert_eq!(process.phase(), Phase::Recovering);
    assert_eq!(h.locks.maintain_count(), 1);
    assert_eq!(h.locks.release_count(), 1);

    stop_and_wait(process).await;
}

#[tokio::test]
async fn recovered_health_reestablishes_presence() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;
    h.health.set_healthy();

    eventually("re-registration", || h.locks.maintain_count() == 2).await;
    eventually("tracking again", || process.phase() == Phase::Tracking).await;
    assert_eq!(process.generation(), 2);
    assert_eq!(
        h.locks.maintain_args(1),
        Some((h.interval, Harness::record()))
    );

    // Timer is off: no checks without renewals
    let checks = h.checks();
    consistently("no timer checks", h.interval() * 4, || h.checks() == checks).await;

    // New stream drives checks
    h.deliver(2, true).await;
    eventually("check on new stream", || h.checks() == checks + 1).await;

    stop_and_wait(process).await;
}

#[tokio::test]
async fn reregistration_failure_keeps_retrying() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;
    h.locks.set_maintain_error(Some("store down"));
    h.health.set_healthy();

    eventually("repeated registration attempts", || {
        h.locks.maintain_count() >= 4
    })
    .await;
    assert_eq!(process.phase(), Phase::Recovering);
    assert!(process.is_running());

    h.locks.set_maintain_error(None);
    eventually("tracking again", || process.phase() == Phase::Tracking).await;
    assert_eq!(process.generation(), 2);

    stop_and_wait(process).await;
}

#[tokio::test]
async fn release_failure_does_not_block_recovery() {
    let h = Harness::new(50);
    let process = h.start().await;
    h.locks.set_release_error(Some("already gone"));

    h.fail_into_recovery(&process).await;

    assert_eq!(h.locks.release_count(), 1);
    eventually("retry after failed release", || h.checks() >= 2).await;
    assert!(process.is_running());

    stop_and_wait(process).await;
}

#[tokio::test]
async fn closed_stream_starts_recovery() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.locks.close_stream(1);

    eventually("recovering", || process.phase() == Phase::Recovering).await;
    assert_eq!(h.locks.release_count(), 1);

    // Healthy node re-registers on the next tick
    eventually("re-registration", || h.locks.maintain_count() == 2).await;
    eventually("tracking again", || process.phase() == Phase::Tracking).await;

    stop_and_wait(process).await;
}

#[tokio::test]
async fn old_generation_cannot_affect_new_one() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;
    h.health.set_healthy();
    eventually("tracking again", || process.phase() == Phase::Tracking).await;

    let checks = h.checks();
    assert!(h.locks.status_sender(1).unwrap().send(false).await.is_err());
    assert!(h.locks.status_sender(1).unwrap().send(true).await.is_err());
    consistently("unchanged", h.interval() * 2, || {
        h.checks() == checks && process.phase() == Phase::Tracking
    })
    .await;

    stop_and_wait(process).await;
}

// =============================================================================
// Stopping
// =============================================================================

#[tokio::test]
async fn stop_while_tracking_releases_once() {
    let h = Harness::new(500);
    let process = h.start().await;

    stop_and_wait(process).await;

    assert_eq!(h.locks.release_count(), 1);
    assert_eq!(h.locks.held_count(), 0);
    assert_eq!(
        h.locks.calls().last(),
        Some(&LockCall::Release {
            token: "fake-lease-1".to_string()
        })
    );
}

#[tokio::test]
async fn stop_while_recovering_has_nothing_left_to_release() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;
    stop_and_wait(process).await;

    assert_eq!(h.locks.release_count(), 1);
    assert_eq!(h.locks.held_count(), 0);
}

#[tokio::test]
async fn stop_after_recovery_releases_new_generation() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;
    h.health.set_healthy();
    eventually("tracking again", || process.phase() == Phase::Tracking).await;

    stop_and_wait(process).await;

    assert_eq!(h.locks.release_count(), 2);
    assert_eq!(h.locks.held_count(), 0);
}

#[tokio::test]
async fn stop_is_prompt_regardless_of_interval() {
    // Interval far longer than the allowed stop latency
    let h = Harness::new(60_000);

    let tracking = h.start().await;
    tokio::time::timeout(Duration::from_secs(1), async {
        tracking.stop();
        tracking.wait().await
    })
    .await
    .unwrap()
    .unwrap();

    let h = Harness::new(60_000);
    let recovering = h.start().await;
    h.fail_into_recovery(&recovering).await;
    tokio::time::timeout(Duration::from_secs(1), async {
        recovering.stop();
        recovering.wait().await
    })
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn nothing_happens_after_stop() {
    let h = Harness::new(50);
    let process = h.start().await;

    h.fail_into_recovery(&process).await;
    stop_and_wait(process).await;

    let checks = h.checks();
    let calls = h.locks.calls().len();
    tokio::time::sleep(h.interval() * 4).await;
    assert_eq!(h.checks(), checks);
    assert_eq!(h.locks.calls().len(), calls);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let h = Harness::new(500);
    let process = h.start().await;

    process.stop();
    process.stop();
    tokio::time::timeout(WAIT_LIMIT, process.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.locks.release_count(), 1);
}

#[tokio::test]
async fn dropping_process_stops_maintainer() {
    let h = Harness::new(500);
    let process = h.start().await;

    drop(process);

    eventually("lease released", || h.locks.release_count() == 1).await;
    assert_eq!(h.locks.held_count(), 0);
}

// =============================================================================
// End-to-end scenario
// =============================================================================

#[test]
fn presence_lifecycle_scenario() {
    with_tracing(|logs| async move {
        let h = Harness::new(500);
        let process = h.start().await;

        // Generation 1 drives checks
        h.deliver(1, true).await;
        eventually("check 1", || h.checks() == 1).await;
        h.deliver(1, true).await;
        eventually("check 2", || h.checks() == 2).await;

        // Failing check releases presence
        h.health.set_unhealthy("bam");
        h.deliver(1, true).await;
        eventually("check 3", || h.checks() == 3).await;
        eventually("release", || h.locks.release_count() == 1).await;

        // The retry timer alone drives further checks
        eventually("check 4", || h.checks() == 4).await;

        // Healthy again: next tick re-registers
        h.health.set_healthy();
        eventually("check 5", || h.checks() == 5).await;
        eventually("re-registration", || h.locks.maintain_count() == 2).await;
        eventually("tracking", || process.phase() == Phase::Tracking).await;

        // Generation 2 drives checks
        h.deliver(2, true).await;
        eventually("check 6", || h.checks() == 6).await;

        // Lost lock: logged, no check, still running
        h.deliver(2, false).await;
        eventually("lost-lock log", || {
            !logs.lines_with(&["ERROR", "lost-lock", "executor-id"]).is_empty()
        })
        .await;
        consistently("still running", h.interval() * 2, || {
            process.is_running() && h.checks() == 6
        })
        .await;

        stop_and_wait(process).await;
        assert_eq!(h.locks.release_count(), 2);
    });
}
