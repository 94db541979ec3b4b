// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rep-core: data model and configuration for executor presence

pub mod config;
pub mod presence;

pub use config::{ConfigError, RepConfig};
pub use presence::{ExecutorId, HeartbeatInterval, PresenceRecord};
