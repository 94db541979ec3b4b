// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Executor presence maintenance engine

mod error;
mod maintainer;
mod phase;

pub use error::MaintainError;
pub use maintainer::{MaintainerProcess, MaintainerStatus, PresenceMaintainer};
pub use phase::{Phase, PhaseAction, PhaseEvent};
