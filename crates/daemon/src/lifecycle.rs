// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown of the maintainer.

use std::path::PathBuf;

use async_trait::async_trait;
use rep_adapters::{
    FsLockCoordinator, HealthChecker, HealthError, HttpHealthChecker, NoOpHealthChecker,
    TracedHealthChecker, TracedLockCoordinator,
};
use rep_core::{ConfigError, RepConfig};
use rep_engine::{MaintainError, MaintainerProcess, PresenceMaintainer};
use thiserror::Error;
use tracing::info;

/// Maintainer with concrete adapter types (wrapped with tracing)
pub type DaemonMaintainer =
    PresenceMaintainer<TracedHealthChecker<ExecutorHealth>, TracedLockCoordinator<FsLockCoordinator>>;

/// Health checker selected by configuration
#[derive(Clone)]
pub enum ExecutorHealth {
    Http(HttpHealthChecker),
    NoOp(NoOpHealthChecker),
}

impl ExecutorHealth {
    pub fn from_config(config: &RepConfig) -> Self {
        match &config.health_url {
            Some(url) => Self::Http(HttpHealthChecker::new(url.clone(), config.health_timeout)),
            None => Self::NoOp(NoOpHealthChecker::new()),
        }
    }
}

#[async_trait]
impl HealthChecker for ExecutorHealth {
    async fn check(&self) -> Result<(), HealthError> {
        match self {
            Self::Http(checker) => checker.check().await,
            Self::NoOp(checker) => checker.check().await,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create presence directory {0}: {1}")]
    PresenceDir(PathBuf, #[source] std::io::Error),

    #[error("Log path has no file name: {0}")]
    LogPath(PathBuf),

    #[error("Maintainer error: {0}")]
    Maintain(#[from] MaintainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the maintainer for a validated configuration
pub fn build_maintainer(config: &RepConfig) -> DaemonMaintainer {
    let locks = TracedLockCoordinator::new(FsLockCoordinator::new(
        config.presence_dir.clone(),
        config.presence_ttl,
    ));
    let health = TracedHealthChecker::new(ExecutorHealth::from_config(config));

    PresenceMaintainer::new(
        config.record().clone(),
        health,
        locks,
        config.heartbeat_interval(),
    )
}

/// Register presence and start maintaining it
pub async fn startup(config: &RepConfig) -> Result<MaintainerProcess, DaemonError> {
    std::fs::create_dir_all(&config.presence_dir)
        .map_err(|e| DaemonError::PresenceDir(config.presence_dir.clone(), e))?;

    let process = build_maintainer(config).start().await?;

    info!(
        executor_id = %config.record().executor_id(),
        presence_dir = %config.presence_dir.display(),
        health = config.health_url.as_deref().unwrap_or("none"),
        "daemon started"
    );
    Ok(process)
}

/// Stop the maintainer and wait for its presence to be released
pub async fn shutdown(process: MaintainerProcess) -> Result<(), DaemonError> {
    info!("Shutting down daemon...");
    process.stop();
    process.wait().await?;
    info!("Daemon shutdown complete");
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
