// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::health::{HealthChecker, HealthError};
use crate::lock::{LeaseHandle, LockCoordinator, LockError, StatusStream};
use async_trait::async_trait;
use rep_core::{HeartbeatInterval, PresenceRecord};
use tracing::Instrument;

/// Wrapper that adds tracing to any LockCoordinator
#[derive(Clone)]
pub struct TracedLockCoordinator<L> {
    inner: L,
}

impl<L> TracedLockCoordinator<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: LockCoordinator> LockCoordinator for TracedLockCoordinator<L> {
    async fn maintain(
        &self,
        interval: HeartbeatInterval,
        record: &PresenceRecord,
    ) -> Result<(LeaseHandle, StatusStream), LockError> {
        let span = tracing::info_span!(
            "lock.maintain",
            executor_id = %record.executor_id(),
            stack = record.stack(),
        );

        async {
            tracing::info!(
                interval_ms = interval.as_duration().as_millis() as u64,
                "registering presence"
            );

            let start = std::time::Instant::now();
            let result = self.inner.maintain(interval, record).await;
            let elapsed = start.elapsed();

            match &result {
                Ok((handle, _)) => tracing::info!(
                    lease = handle.token(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "presence registered"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "registration failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn release(&self, handle: LeaseHandle) -> Result<(), LockError> {
        let span = tracing::info_span!(
            "lock.release",
            executor_id = %handle.executor_id(),
            lease = handle.token(),
        );

        async move {
            let result = self.inner.release(handle).await;
            // release failing is tolerable: the record expires on its own
            match &result {
                Ok(()) => tracing::info!("presence released"),
                Err(e) => tracing::warn!(error = %e, "release failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any HealthChecker
#[derive(Clone)]
pub struct TracedHealthChecker<H> {
    inner: H,
}

impl<H> TracedHealthChecker<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: HealthChecker> HealthChecker for TracedHealthChecker<H> {
    async fn check(&self) -> Result<(), HealthError> {
        let start = std::time::Instant::now();
        let result = self.inner.check().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => tracing::trace!(elapsed_ms, "health check passed"),
            Err(e) => tracing::debug!(elapsed_ms, error = %e, "health check failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
