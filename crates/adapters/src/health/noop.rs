// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op health checker for nodes without a local executor endpoint.

use super::{HealthChecker, HealthError};
use async_trait::async_trait;

/// Health checker that always passes.
///
/// Used when no executor ping URL is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpHealthChecker;

impl NoOpHealthChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HealthChecker for NoOpHealthChecker {
    async fn check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}
