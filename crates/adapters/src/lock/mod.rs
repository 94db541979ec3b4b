// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock coordination adapters: keep a presence record leased in a shared store

mod fs;

pub use fs::{FsLockCoordinator, StoredPresence};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLockCoordinator, LockCall};

use async_trait::async_trait;
use rep_core::{ExecutorId, HeartbeatInterval, PresenceRecord};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from lock operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("presence for {0} is held by another owner")]
    Held(ExecutorId),
    #[error("store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Ownership token for one registration of a presence record.
///
/// Not `Clone`: [`LockCoordinator::release`] consumes it, so a released
/// handle cannot be used again.
#[derive(Debug, PartialEq, Eq)]
pub struct LeaseHandle {
    executor_id: ExecutorId,
    token: String,
}

impl LeaseHandle {
    pub fn new(executor_id: ExecutorId, token: impl Into<String>) -> Self {
        Self {
            executor_id,
            token: token.into(),
        }
    }

    pub fn executor_id(&self) -> &ExecutorId {
        &self.executor_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Renewal outcomes for one lease: `true` renewed, `false` renewal failed.
///
/// Dropping the stream abandons it; the producer observes the closed
/// channel on its next send.
#[derive(Debug)]
pub struct StatusStream {
    rx: mpsc::Receiver<bool>,
}

impl StatusStream {
    pub fn new(rx: mpsc::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Next renewal outcome, or `None` once the producer has gone away
    pub async fn recv(&mut self) -> Option<bool> {
        self.rx.recv().await
    }
}

/// Adapter for leasing a presence record in a coordination store
#[async_trait]
pub trait LockCoordinator: Clone + Send + Sync + 'static {
    /// Register the record and start renewing it every `interval`.
    ///
    /// The renewal loop keeps retrying after a failed renewal and keeps the
    /// stream open until the handle is released or the stream dropped.
    async fn maintain(
        &self,
        interval: HeartbeatInterval,
        record: &PresenceRecord,
    ) -> Result<(LeaseHandle, StatusStream), LockError>;

    /// Stop renewing and unregister the record.
    ///
    /// Succeeds when the record is already gone from the store.
    async fn release(&self, handle: LeaseHandle) -> Result<(), LockError>;
}
