// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presence data model: the record an executor advertises and the
//! heartbeat cadence it is advertised at.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unique identifier of an executor node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorId(String);

impl ExecutorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExecutorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ExecutorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The presence advertised for one executor.
///
/// Immutable once built: the maintainer registers the same record for
/// every generation of its lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    executor_id: ExecutorId,
    stack: String,
}

impl PresenceRecord {
    pub fn new(executor_id: impl Into<ExecutorId>, stack: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            stack: stack.into(),
        }
    }

    pub fn executor_id(&self) -> &ExecutorId {
        &self.executor_id
    }

    /// Stack (capability tag) the executor can run work for
    pub fn stack(&self) -> &str {
        &self.stack
    }
}

/// Cadence for lease renewal and for local health retries while recovering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeartbeatInterval(Duration);

impl HeartbeatInterval {
    pub fn new(duration: Duration) -> Result<Self, ConfigError> {
        if duration.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self(duration))
    }

    pub fn from_millis(millis: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<HeartbeatInterval> for Duration {
    fn from(interval: HeartbeatInterval) -> Self {
        interval.0
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
