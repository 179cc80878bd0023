//! Installing new files into instance directories.
//!
//! This module provides:
//! - Dated backup names for outgoing files
//! - Per-category backup retention
//! - Embedded-version verification of the installed executable
//! - The update driver that sequences all of the above per instance

pub mod backup;
pub mod driver;
pub mod retention;
pub mod verification;

pub use backup::{split_file_name, BackupNamer};
pub use driver::{
    AbortReason, FailureReason, InstanceOutcome, RunSummary, StepOutcome, UpdateDriver,
};
pub use retention::{prune_backups, select_excess, BackupEntry, PruneOutcome};
pub use verification::{verify_installed_version, VerificationResult};
