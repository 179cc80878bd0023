//! Exit codes for the fleet-rollout CLI.
//!
//! Exit code ranges:
//! - 0-9: Run outcomes (parse outcome from code, not output)
//! - 10-19: User/environment errors (recoverable by operator action)
//! - 20-29: Internal errors

use crate::install::RunSummary;

/// Exit codes for fleet-rollout operations.
///
/// These codes are a stable contract for the schedulers that invoke the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Run Outcomes (0-9)
    // ========================================================================
    /// Every instance updated, or nothing to do
    Clean = 0,

    /// Run completed but at least one instance failed
    PartialFail = 3,

    /// Run stopped early (version mismatch or restart failure under abort policy)
    RunAborted = 4,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Service manager binary not available on this host
    ServiceUnavailable = 11,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error
    InternalError = 20,

    /// I/O error outside the per-instance protocol (discovery root, log dir)
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Check if this exit code indicates any error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Map a finished run to its exit code.
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.aborted.is_some() {
            ExitCode::RunAborted
        } else if summary.fail > 0 {
            ExitCode::PartialFail
        } else {
            ExitCode::Clean
        }
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::RunAborted => "ERR_ABORTED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ServiceUnavailable => "ERR_SERVICE_UNAVAILABLE",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
