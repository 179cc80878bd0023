//! Fleet Rollout Core Library
//!
//! This library provides the core functionality for fleet rollouts:
//! - Instance discovery and staged source resolution
//! - Embedded version extraction from PE executables
//! - Backup naming, retention and the per-instance update driver
//! - Service manager control (systemd, Windows SCM)
//! - Structured logging and CLI exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod discover;
pub mod exit_codes;
pub mod install;
pub mod logging;
pub mod pe;
pub mod service;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_service;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
