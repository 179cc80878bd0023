//! Structured event vocabulary for rollout logs.
//!
//! Every event carries the run correlation id, the host id and a stage; events
//! about a single instance also carry its id.

use serde::{Deserialize, Serialize};

/// Log levels as they appear in JSONL records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of a rollout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Instance directory discovery.
    Discover,
    /// Source set resolution.
    Resolve,
    /// Moving outgoing files aside.
    Backup,
    /// Copying and renaming new files.
    Install,
    /// Embedded version check.
    Verify,
    /// Service restart.
    Restart,
    /// Backup retention.
    Prune,
    /// Final counts.
    Summary,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Discover => "discover",
            Stage::Resolve => "resolve",
            Stage::Backup => "backup",
            Stage::Install => "install",
            Stage::Verify => "verify",
            Stage::Restart => "restart",
            Stage::Prune => "prune",
            Stage::Summary => "summary",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used as tracing targets.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_PROGRESS: &str = "run.progress";
    pub const RUN_ABORTED: &str = "run.aborted";
    pub const RUN_FINISHED: &str = "run.finished";

    // Discovery and source resolution
    pub const DISCOVER_INSTANCE: &str = "discover.instance";
    pub const DISCOVER_EXCLUDED: &str = "discover.excluded";
    pub const DISCOVER_AMBIGUOUS: &str = "discover.ambiguous";
    pub const DISCOVER_UNREADABLE: &str = "discover.unreadable";
    pub const RESOLVE_SOURCE: &str = "resolve.source";
    pub const RESOLVE_DUPLICATE: &str = "resolve.duplicate";

    // Per-instance protocol
    pub const INSTANCE_STARTED: &str = "instance.started";
    pub const INSTANCE_SKIPPED: &str = "instance.skipped";
    pub const INSTANCE_UPDATED: &str = "instance.updated";
    pub const BACKUP_RENAMED: &str = "backup.renamed";
    pub const BACKUP_RENAME_FAILED: &str = "backup.rename_failed";
    pub const INSTALL_COPIED: &str = "install.copied";
    pub const INSTALL_COPY_FAILED: &str = "install.copy_failed";
    pub const INSTALL_RENAME_FAILED: &str = "install.rename_failed";
    pub const VERIFY_PASSED: &str = "verify.passed";
    pub const VERIFY_MISMATCH: &str = "verify.mismatch";
    pub const RESTART_OK: &str = "restart.ok";
    pub const RESTART_FAILED: &str = "restart.failed";
    pub const POLICY_UNRECOGNIZED: &str = "policy.unrecognized";
    pub const PRUNE_DELETED: &str = "prune.deleted";
    pub const PRUNE_FAILED: &str = "prune.failed";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";
}

/// Correlation context shared by all events of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// Host identifier.
    pub host_id: String,
    /// Instance currently being updated, if any.
    pub instance_id: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
            instance_id: None,
        }
    }

    /// A copy of this context scoped to one instance.
    pub fn for_instance(&self, instance_id: impl Into<String>) -> Self {
        LogContext {
            instance_id: Some(instance_id.into()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [Stage::Discover, Stage::Backup, Stage::Restart, Stage::Summary] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_instance_context_keeps_run_ids() {
        let ctx = LogContext::new("run-abc", "host-xyz");
        let scoped = ctx.for_instance("007");
        assert_eq!(scoped.run_id, "run-abc");
        assert_eq!(scoped.host_id, "host-xyz");
        assert_eq!(scoped.instance_id.as_deref(), Some("007"));
        assert!(ctx.instance_id.is_none());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names::RUN_STARTED, "run.started");
        assert_eq!(event_names::VERIFY_MISMATCH, "verify.mismatch");
        assert_eq!(event_names::RESTART_OK, "restart.ok");
    }
}
