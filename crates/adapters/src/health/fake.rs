// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake health checker for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{HealthChecker, HealthError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeHealthState {
    calls: usize,
    failure: Option<String>,
}

/// Fake health checker for testing; healthy until told otherwise
#[derive(Clone, Default)]
pub struct FakeHealthChecker {
    inner: Arc<Mutex<FakeHealthState>>,
}

impl FakeHealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checks performed so far
    pub fn check_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).calls
    }

    pub fn set_healthy(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).failure = None;
    }

    /// Fail subsequent checks with the given reason
    pub fn set_unhealthy(&self, reason: &str) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).failure = Some(reason.to_string());
    }
}

#[async_trait]
impl HealthChecker for FakeHealthChecker {
    async fn check(&self) -> Result<(), HealthError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.calls += 1;
        match &state.failure {
            Some(reason) => Err(HealthError::Unhealthy(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
