// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake lock coordinator for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LeaseHandle, LockCoordinator, LockError, StatusStream};
use async_trait::async_trait;
use rep_core::{HeartbeatInterval, PresenceRecord};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Recorded lock call
#[derive(Debug, Clone, PartialEq)]
pub enum LockCall {
    Maintain {
        interval: HeartbeatInterval,
        record: PresenceRecord,
    },
    Release {
        token: String,
    },
}

#[derive(Default)]
struct FakeLockState {
    calls: Vec<LockCall>,
    /// Status senders, one per successful maintain, oldest first
    senders: Vec<Option<mpsc::Sender<bool>>>,
    held: Vec<String>,
    maintain_error: Option<String>,
    release_error: Option<String>,
}

/// Fake lock coordinator for testing.
///
/// Every successful `maintain` hands out a fresh status stream whose sender
/// the test drives through [`FakeLockCoordinator::status_sender`].
#[derive(Clone, Default)]
pub struct FakeLockCoordinator {
    inner: Arc<Mutex<FakeLockState>>,
}

impl FakeLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<LockCall> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    pub fn maintain_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, LockCall::Maintain { .. }))
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, LockCall::Release { .. }))
            .count()
    }

    /// Arguments of the `n`th maintain call (0-based)
    pub fn maintain_args(&self, n: usize) -> Option<(HeartbeatInterval, PresenceRecord)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                LockCall::Maintain { interval, record } => Some((interval, record)),
                LockCall::Release { .. } => None,
            })
            .nth(n)
    }

    /// Sender behind the stream of the given generation (1 = first successful maintain)
    pub fn status_sender(&self, generation: usize) -> Option<mpsc::Sender<bool>> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        generation
            .checked_sub(1)
            .and_then(|i| state.senders.get(i))
            .and_then(|sender| sender.clone())
    }

    /// Drop the producer side of a generation's stream, as a coordinator
    /// that gave up would
    pub fn close_stream(&self, generation: usize) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = generation
            .checked_sub(1)
            .and_then(|i| state.senders.get_mut(i))
        {
            *sender = None;
        }
    }

    /// Number of handles handed out and not yet released
    pub fn held_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .held
            .len()
    }

    /// Make subsequent maintain calls fail (`None` to succeed again)
    pub fn set_maintain_error(&self, error: Option<&str>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .maintain_error = error.map(str::to_string);
    }

    /// Make subsequent release calls fail (`None` to succeed again)
    pub fn set_release_error(&self, error: Option<&str>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .release_error = error.map(str::to_string);
    }
}

#[async_trait]
impl LockCoordinator for FakeLockCoordinator {
    async fn maintain(
        &self,
        interval: HeartbeatInterval,
        record: &PresenceRecord,
    ) -> Result<(LeaseHandle, StatusStream), LockError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(LockCall::Maintain {
            interval,
            record: record.clone(),
        });

        if let Some(msg) = &state.maintain_error {
            return Err(LockError::Store(msg.clone()));
        }

        let (tx, rx) = mpsc::channel(1);
        state.senders.push(Some(tx));
        let token = format!("fake-lease-{}", state.senders.len());
        state.held.push(token.clone());

        Ok((
            LeaseHandle::new(record.executor_id().clone(), token),
            StatusStream::new(rx),
        ))
    }

    async fn release(&self, handle: LeaseHandle) -> Result<(), LockError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(LockCall::Release {
            token: handle.token().to_string(),
        });
        state.held.retain(|t| t != handle.token());

        match &state.release_error {
            Some(msg) => Err(LockError::Store(msg.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
