// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rep configuration file.
//!
//! ```toml
//! executor_id = "executor-id"
//! stack = "lucid64"
//! heartbeat_interval = "30s"
//!
//! [presence]
//! dir = "/var/vcap/data/rep/presence"
//! ttl = "90s"
//!
//! [health]
//! url = "http://127.0.0.1:1700/ping"
//! timeout = "5s"
//! ```

use crate::presence::{HeartbeatInterval, PresenceRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Presence TTL as a multiple of the heartbeat interval when not configured
pub const DEFAULT_TTL_FACTOR: u32 = 3;

/// Health check timeout when not configured
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("heartbeat interval must be greater than zero")]
    ZeroInterval,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("presence ttl {ttl:?} must exceed heartbeat interval {interval:?}")]
    TtlTooShort { ttl: Duration, interval: Duration },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    executor_id: String,
    stack: String,
    #[serde(with = "humantime_serde")]
    heartbeat_interval: Duration,
    presence: RawPresence,
    #[serde(default)]
    health: RawHealth,
    #[serde(default)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPresence {
    dir: PathBuf,
    #[serde(default, with = "humantime_serde::option")]
    ttl: Option<Duration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHealth {
    url: Option<String>,
    #[serde(default, with = "humantime_serde::option")]
    timeout: Option<Duration>,
}

/// Validated rep configuration
#[derive(Debug, Clone)]
pub struct RepConfig {
    record: PresenceRecord,
    heartbeat_interval: HeartbeatInterval,
    /// Root of the shared presence store
    pub presence_dir: PathBuf,
    /// How long a presence record stays valid without renewal
    pub presence_ttl: Duration,
    /// Executor ping endpoint; `None` means always healthy
    pub health_url: Option<String>,
    pub health_timeout: Duration,
    /// Optional log file in addition to stderr
    pub log_file: Option<PathBuf>,
}

impl RepConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;

        if raw.executor_id.trim().is_empty() {
            return Err(ConfigError::EmptyField("executor_id"));
        }
        if raw.stack.trim().is_empty() {
            return Err(ConfigError::EmptyField("stack"));
        }

        let heartbeat_interval = HeartbeatInterval::new(raw.heartbeat_interval)?;
        let presence_ttl = raw
            .presence
            .ttl
            .unwrap_or(raw.heartbeat_interval * DEFAULT_TTL_FACTOR);
        if presence_ttl <= raw.heartbeat_interval {
            return Err(ConfigError::TtlTooShort {
                ttl: presence_ttl,
                interval: raw.heartbeat_interval,
            });
        }

        Ok(Self {
            record: PresenceRecord::new(raw.executor_id, raw.stack),
            heartbeat_interval,
            presence_dir: raw.presence.dir,
            presence_ttl,
            health_url: raw.health.url.filter(|u| !u.trim().is_empty()),
            health_timeout: raw.health.timeout.unwrap_or(DEFAULT_HEALTH_TIMEOUT),
            log_file: raw.log_file,
        })
    }

    pub fn record(&self) -> &PresenceRecord {
        &self.record
    }

    pub fn heartbeat_interval(&self) -> HeartbeatInterval {
        self.heartbeat_interval
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
