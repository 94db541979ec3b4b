// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health check adapters: is the local executor fit to advertise presence?

mod http;
mod noop;

pub use http::HttpHealthChecker;
pub use noop::NoOpHealthChecker;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeHealthChecker;

use async_trait::async_trait;
use thiserror::Error;

/// Reasons a health check did not pass
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("executor unreachable: {0}")]
    Unreachable(String),
    #[error("executor responded with status {0}")]
    Status(u16),
    #[error("executor unhealthy: {0}")]
    Unhealthy(String),
}

/// Adapter for checking local node health
#[async_trait]
pub trait HealthChecker: Clone + Send + Sync + 'static {
    /// `Ok` when the node is fit to advertise presence; any error means unhealthy
    async fn check(&self) -> Result<(), HealthError>;
}
