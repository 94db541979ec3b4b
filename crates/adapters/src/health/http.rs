// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor ping over HTTP

use super::{HealthChecker, HealthError};
use async_trait::async_trait;
use std::time::Duration;

/// Health checker that pings the local executor's HTTP endpoint.
///
/// Any 2xx response is healthy. Other statuses, connection errors and
/// timeouts are unhealthy.
#[derive(Clone)]
pub struct HttpHealthChecker {
    url: String,
    agent: ureq::Agent,
}

impl HttpHealthChecker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self) -> Result<(), HealthError> {
        let url = self.url.clone();
        let agent = self.agent.clone();

        // ureq is blocking
        tokio::task::spawn_blocking(move || match agent.get(&url).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => Err(HealthError::Status(code)),
            Err(e) => Err(HealthError::Unreachable(e.to_string())),
        })
        .await
        .map_err(|e| HealthError::Unhealthy(format!("ping task failed: {}", e)))?
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
