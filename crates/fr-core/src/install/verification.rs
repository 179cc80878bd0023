//! Post-install verification of the embedded executable version.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::pe::read_file_version;

/// Result of a verification check
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Whether the installed version equals the expected one
    pub passed: bool,
    pub expected: String,
    /// The version string if it could be read
    pub version: Option<String>,
    /// Read error, if any
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Read `binary_path`'s embedded version and compare it exactly with
/// `expected`. A read failure counts as a mismatch.
pub fn verify_installed_version(binary_path: &Path, expected: &str) -> VerificationResult {
    let start = Instant::now();
    let (version, error) = match read_file_version(binary_path) {
        Ok(v) => (Some(v.to_string()), None),
        Err(e) => (None, Some(e.to_string())),
    };
    VerificationResult {
        passed: version.as_deref() == Some(expected),
        expected: expected.to_string(),
        version,
        error,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
