// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presence maintainer: keeps an executor's presence leased while the
//! executor is healthy, and re-establishes it after local recovery.
//!
//! One task drives the [`Phase`] table. Each iteration waits on exactly one
//! multiplexed `select!`: the stop signal plus the renewal stream while
//! tracking, or the stop signal plus the retry timer while recovering.
//! Side effects run inline, so at most one health check or registration
//! call is in flight.

use crate::error::MaintainError;
use crate::phase::{Phase, PhaseAction, PhaseEvent};
use rep_adapters::{HealthChecker, LeaseHandle, LockCoordinator, StatusStream};
use rep_core::{HeartbeatInterval, PresenceRecord};
use std::collections::VecDeque;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::Instrument;

/// Observable state of a running maintainer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintainerStatus {
    pub phase: Phase,
    /// Registrations completed so far; 1 after startup
    pub generation: u64,
}

/// Presence maintainer for one executor
pub struct PresenceMaintainer<H, L> {
    record: PresenceRecord,
    health: H,
    locks: L,
    interval: HeartbeatInterval,
}

impl<H: HealthChecker, L: LockCoordinator> PresenceMaintainer<H, L> {
    pub fn new(record: PresenceRecord, health: H, locks: L, interval: HeartbeatInterval) -> Self {
        Self {
            record,
            health,
            locks,
            interval,
        }
    }

    /// Register the presence and start maintaining it.
    ///
    /// Registration happens before this returns; if it fails nothing is
    /// started and the error is returned.
    pub async fn start(self) -> Result<MaintainerProcess, MaintainError> {
        let (lease, stream) = self.locks.maintain(self.interval, &self.record).await?;

        let initial = MaintainerStatus {
            phase: Phase::Tracking,
            generation: 1,
        };
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(initial);

        let span = tracing::info_span!(
            "maintain_presence",
            executor_id = %self.record.executor_id(),
        );

        let driver = Driver {
            record: self.record,
            health: self.health,
            locks: self.locks,
            interval: self.interval,
            status: initial,
            lease: Some(lease),
            stream: Some(stream),
            retry: None,
            status_tx,
        };
        let task = tokio::spawn(driver.run(stop_rx).instrument(span));

        Ok(MaintainerProcess {
            stop_tx,
            status_rx,
            task,
        })
    }
}

/// Control surface of a started maintainer.
///
/// Dropping it without calling [`MaintainerProcess::stop`] also stops the
/// maintainer.
pub struct MaintainerProcess {
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<MaintainerStatus>,
    task: JoinHandle<()>,
}

impl MaintainerProcess {
    /// Signal the maintainer to stop. Idempotent.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Wait until the maintainer has stopped and released its lease
    pub async fn wait(self) -> Result<(), MaintainError> {
        let Self {
            stop_tx, task, ..
        } = self;
        let result = task.await;
        drop(stop_tx);
        result.map_err(|e| MaintainError::Task(e.to_string()))
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn status(&self) -> MaintainerStatus {
        *self.status_rx.borrow()
    }

    pub fn phase(&self) -> Phase {
        self.status().phase
    }

    pub fn generation(&self) -> u64 {
        self.status().generation
    }
}

/// Loop state owned by the maintainer task
struct Driver<H, L> {
    record: PresenceRecord,
    health: H,
    locks: L,
    interval: HeartbeatInterval,
    status: MaintainerStatus,
    /// Lease and stream of the current generation; both `None` while recovering
    lease: Option<LeaseHandle>,
    stream: Option<StatusStream>,
    retry: Option<Interval>,
    status_tx: watch::Sender<MaintainerStatus>,
}

impl<H: HealthChecker, L: LockCoordinator> Driver<H, L> {
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        tracing::info!(
            stack = self.record.stack(),
            interval_ms = self.interval.as_duration().as_millis() as u64,
            "started"
        );

        while !self.status.phase.is_terminal() {
            let event = self.next_event(&mut stop).await;
            self.handle(event).await;
        }

        tracing::info!(generation = self.status.generation, "stopped");
    }

    /// Wait for the next input relevant to the current phase
    async fn next_event(&mut self, stop: &mut watch::Receiver<bool>) -> PhaseEvent {
        // A dropped sender means the owner is gone: treat as stop
        let stopped = async {
            let _ = stop.wait_for(|stopped| *stopped).await;
        };

        match self.status.phase {
            Phase::Tracking => {
                let Some(stream) = self.stream.as_mut() else {
                    return PhaseEvent::StreamClosed;
                };
                tokio::select! {
                    biased;
                    _ = stopped => PhaseEvent::Stop,
                    status = stream.recv() => match status {
                        Some(true) => {
                            tracing::debug!(generation = self.status.generation, "renewed");
                            PhaseEvent::Renewed
                        }
                        Some(false) => PhaseEvent::RenewalFailed,
                        None => {
                            tracing::warn!(
                                generation = self.status.generation,
                                "status-stream-closed"
                            );
                            PhaseEvent::StreamClosed
                        }
                    },
                }
            }
            Phase::Recovering => {
                let retry = self.retry.get_or_insert_with(|| retry_timer(self.interval));
                tokio::select! {
                    biased;
                    _ = stopped => PhaseEvent::Stop,
                    _ = retry.tick() => PhaseEvent::RetryTick,
                }
            }
            Phase::Stopped => PhaseEvent::Stop,
        }
    }

    /// Apply an event and every follow-up event its actions produce
    async fn handle(&mut self, event: PhaseEvent) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let from = self.status.phase;
            let (to, actions) = from.transition(event);
            if from != to {
                tracing::debug!(?event, ?from, ?to, "transition");
            }
            self.status.phase = to;

            for action in actions {
                if let Some(follow_up) = self.perform(action).await {
                    pending.push_back(follow_up);
                }
            }
        }

        self.status_tx.send_replace(self.status);
    }

    async fn perform(&mut self, action: PhaseAction) -> Option<PhaseEvent> {
        match action {
            PhaseAction::CheckHealth => match self.health.check().await {
                Ok(()) => Some(PhaseEvent::HealthPassed),
                Err(e) => {
                    tracing::warn!(phase = ?self.status.phase, error = %e, "health-check-failed");
                    Some(PhaseEvent::HealthFailed)
                }
            },

            PhaseAction::ReportLostLock => {
                tracing::error!(
                    executor_id = %self.record.executor_id(),
                    generation = self.status.generation,
                    "lost-lock"
                );
                None
            }

            PhaseAction::ReleaseLease => {
                if let Some(lease) = self.lease.take() {
                    match self.locks.release(lease).await {
                        Ok(()) => tracing::info!(
                            generation = self.status.generation,
                            "presence-released"
                        ),
                        Err(e) => tracing::warn!(error = %e, "release-failed"),
                    }
                }
                None
            }

            PhaseAction::AbandonStream => {
                if self.stream.take().is_some() {
                    tracing::debug!(generation = self.status.generation, "stream abandoned");
                }
                None
            }

            PhaseAction::ArmRetryTimer => {
                self.retry = Some(retry_timer(self.interval));
                None
            }

            PhaseAction::DisarmRetryTimer => {
                self.retry = None;
                None
            }

            PhaseAction::Register => {
                match self.locks.maintain(self.interval, &self.record).await {
                    Ok((lease, stream)) => {
                        self.lease = Some(lease);
                        self.stream = Some(stream);
                        self.status.generation += 1;
                        tracing::info!(
                            generation = self.status.generation,
                            "presence-reestablished"
                        );
                        Some(PhaseEvent::Registered)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reregister-failed");
                        Some(PhaseEvent::RegistrationFailed)
                    }
                }
            }
        }
    }
}

/// Fixed-cadence timer whose first tick is one interval out
fn retry_timer(interval: HeartbeatInterval) -> Interval {
    let period = interval.as_duration();
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

#[cfg(test)]
#[path = "maintainer_tests.rs"]
mod tests;
