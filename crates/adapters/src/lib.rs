// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the presence maintainer's collaborators

pub mod health;
pub mod lock;
pub mod traced;

pub use health::{HealthChecker, HealthError, HttpHealthChecker, NoOpHealthChecker};
pub use lock::{FsLockCoordinator, LeaseHandle, LockCoordinator, LockError, StatusStream};
pub use traced::{TracedHealthChecker, TracedLockCoordinator};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use health::FakeHealthChecker;
#[cfg(any(test, feature = "test-support"))]
pub use lock::{FakeLockCoordinator, LockCall};
