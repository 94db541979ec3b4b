// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the presence maintainer

use rep_adapters::LockError;
use thiserror::Error;

/// Errors surfaced by a presence maintainer.
///
/// Only startup and task failure reach the caller; failures while running
/// are logged and retried.
#[derive(Debug, Error)]
pub enum MaintainError {
    #[error("failed to register presence: {0}")]
    Registration(#[from] LockError),
    #[error("maintainer task failed: {0}")]
    Task(String),
}
