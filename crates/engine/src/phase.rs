// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presence maintenance phases and their transition table.
//!
//! The table is pure: it names the side effects to perform and the driver
//! in `maintainer.rs` performs them, feeding outcomes back as events.

/// Phase of a presence maintainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Holding a lease and consuming its renewal stream
    Tracking,
    /// Lease given up after a local health failure; retrying on a timer
    Recovering,
    /// Terminal
    Stopped,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Stopped)
    }
}

/// Inputs to the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Renewal stream reported `true`
    Renewed,
    /// Renewal stream reported `false`
    RenewalFailed,
    /// Renewal stream ended without a release
    StreamClosed,
    /// Retry timer fired
    RetryTick,
    HealthPassed,
    HealthFailed,
    /// Re-registration produced a new generation
    Registered,
    RegistrationFailed,
    Stop,
}

/// Side effects requested by a transition, performed in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    CheckHealth,
    /// Record a lost lock for the current generation
    ReportLostLock,
    /// Release the held lease, if any
    ReleaseLease,
    /// Stop consuming the current renewal stream
    AbandonStream,
    ArmRetryTimer,
    DisarmRetryTimer,
    /// Register the presence again for a new generation
    Register,
}

impl Phase {
    /// Pure state transition function
    pub fn transition(self, event: PhaseEvent) -> (Phase, Vec<PhaseAction>) {
        use PhaseAction::*;

        match (self, event) {
            (Phase::Stopped, _) => (Phase::Stopped, vec![]),

            (_, PhaseEvent::Stop) => (
                Phase::Stopped,
                vec![DisarmRetryTimer, AbandonStream, ReleaseLease],
            ),

            // Tracking: renewal outcomes drive health checks
            (Phase::Tracking, PhaseEvent::Renewed) => (Phase::Tracking, vec![CheckHealth]),
            (Phase::Tracking, PhaseEvent::RenewalFailed) => {
                (Phase::Tracking, vec![ReportLostLock])
            }
            (Phase::Tracking, PhaseEvent::HealthPassed) => (Phase::Tracking, vec![]),
            (Phase::Tracking, PhaseEvent::HealthFailed | PhaseEvent::StreamClosed) => (
                Phase::Recovering,
                vec![ReleaseLease, AbandonStream, ArmRetryTimer],
            ),

            // Recovering: the timer drives health checks, then re-registration
            (Phase::Recovering, PhaseEvent::RetryTick) => (Phase::Recovering, vec![CheckHealth]),
            (Phase::Recovering, PhaseEvent::HealthPassed) => (Phase::Recovering, vec![Register]),
            (Phase::Recovering, PhaseEvent::HealthFailed | PhaseEvent::RegistrationFailed) => {
                (Phase::Recovering, vec![])
            }
            (Phase::Recovering, PhaseEvent::Registered) => {
                (Phase::Tracking, vec![DisarmRetryTimer])
            }

            // Inputs a phase never waits for are ignored
            (phase, _) => (phase, vec![]),
        }
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
