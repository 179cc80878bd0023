//! Per-instance update protocol and the run loop around it.
//!
//! For each instance, in id order:
//!
//! 1. Move the live executable aside (failure skips the instance).
//! 2. For every auxiliary source file, move the live copy aside, prune that
//!    file's backups, then copy the new file in. The main executable is
//!    copied without a backup step.
//! 3. Rename the copied main executable to `<prefix><id>.exe`.
//! 4. Check the embedded version. Any mismatch stops the whole run.
//! 5. Prune executable backups and restart the service; the stop policy
//!    decides whether a failed restart stops the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fr_config::{StopPolicy, UpdateConfig};
use serde::Serialize;

use super::backup::{split_file_name, BackupNamer};
use super::retention::{prune_backups, PruneOutcome};
use super::verification::verify_installed_version;
use crate::discover::{Instance, SourceSet};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::service::{restart_service, RestartReport, ServiceController};

const EXE_SUFFIX: &str = ".exe";

fn pid_label(pid: Option<u32>) -> String {
    pid.map_or_else(|| "-".to_string(), |p| p.to_string())
}

/// Why an instance was not updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No executable path could be derived for the instance.
    NoExecutablePath,
    /// The live executable could not be moved aside.
    BackupFailed { error: String },
    /// The copied executable could not take its canonical name.
    InstallFailed { error: String },
    VersionMismatch {
        expected: String,
        actual: Option<String>,
    },
    RestartFailed { service: String, policy: StopPolicy },
}

/// Why a run stopped before reaching every instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    VersionMismatch {
        instance: String,
        expected: String,
        actual: Option<String>,
    },
    RestartFailed { instance: String, service: String },
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::VersionMismatch {
                instance,
                expected,
                actual,
            } => write!(
                f,
                "instance {} reports version {} instead of {}",
                instance,
                actual.as_deref().unwrap_or("<unreadable>"),
                expected
            ),
            AbortReason::RestartFailed { instance, service } => {
                write!(f, "instance {}: service {} did not restart", instance, service)
            }
        }
    }
}

/// Result of one pass of the per-instance protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Instance updated; go on.
    Continue,
    /// Instance failed; go on with the next one.
    SkipInstance(FailureReason),
    /// Instance failed; stop the run.
    AbortRun(AbortReason),
}

/// Everything recorded about one instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstanceOutcome {
    pub id: String,
    pub service: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Backup paths created for outgoing files.
    pub backups: Vec<PathBuf>,
    /// File names copied into the instance directory.
    pub installed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub copy_failures: Vec<String>,
    /// Backups removed by retention.
    pub pruned: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartReport>,
}

/// Totals and per-instance detail for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub success: usize,
    pub fail: usize,
    /// Instances discovered, attempted or not.
    pub total: usize,
    /// Services updated and restarted, in processing order.
    pub updated_services: Vec<String>,
    pub outcomes: Vec<InstanceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
    /// Instance ids left untouched after an abort.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_attempted: Vec<String>,
}

/// Drives the update protocol over every discovered instance.
pub struct UpdateDriver<'a> {
    config: &'a UpdateConfig,
    controller: &'a dyn ServiceController,
    namer: BackupNamer,
    ctx: LogContext,
}

impl<'a> UpdateDriver<'a> {
    pub fn new(
        config: &'a UpdateConfig,
        controller: &'a dyn ServiceController,
        ctx: LogContext,
    ) -> Self {
        Self {
            config,
            controller,
            namer: BackupNamer::today(&config.author),
            ctx,
        }
    }

    /// Use a fixed backup namer instead of today's date.
    pub fn with_namer(mut self, namer: BackupNamer) -> Self {
        self.namer = namer;
        self
    }

    /// Update every instance in ascending id order.
    pub fn run(&self, instances: &BTreeMap<String, Instance>, sources: &SourceSet) -> RunSummary {
        let mut summary = RunSummary {
            run_id: self.ctx.run_id.clone(),
            total: instances.len(),
            ..RunSummary::default()
        };

        log_event!(
            self.ctx,
            INFO,
            event_names::RUN_STARTED,
            Stage::Init,
            "Starting rollout",
            instances = instances.len(),
            sources = sources.len(),
            target_version = display(&self.config.exe_version)
        );

        let mut remaining = instances.values();
        for instance in remaining.by_ref() {
            let mut outcome = InstanceOutcome {
                id: instance.id.clone(),
                service: self.config.service_name(&instance.id),
                ..InstanceOutcome::default()
            };

            let step = self.update_instance(instance, sources, &mut outcome);
            let abort = match step {
                StepOutcome::Continue => {
                    summary.success += 1;
                    outcome.succeeded = true;
                    summary.updated_services.push(outcome.service.clone());
                    None
                }
                StepOutcome::SkipInstance(reason) => {
                    summary.fail += 1;
                    outcome.failure = Some(reason);
                    None
                }
                StepOutcome::AbortRun(reason) => {
                    summary.fail += 1;
                    Some(reason)
                }
            };
            summary.outcomes.push(outcome);

            log_event!(
                self.ctx,
                INFO,
                event_names::RUN_PROGRESS,
                Stage::Summary,
                "Update progress",
                success = summary.success,
                fail = summary.fail,
                total = summary.total
            );

            if let Some(reason) = abort {
                log_event!(
                    self.ctx,
                    ERROR,
                    event_names::RUN_ABORTED,
                    Stage::Summary,
                    "Rollout stopped",
                    reason = display(&reason)
                );
                summary.aborted = Some(reason);
                break;
            }
        }
        summary.not_attempted = remaining.map(|i| i.id.clone()).collect();

        log_event!(
            self.ctx,
            INFO,
            event_names::RUN_FINISHED,
            Stage::Summary,
            "Rollout finished",
            success = summary.success,
            fail = summary.fail,
            total = summary.total
        );
        summary
    }

    /// Run the protocol for one instance, recording details into `outcome`.
    pub fn update_instance(
        &self,
        instance: &Instance,
        sources: &SourceSet,
        outcome: &mut InstanceOutcome,
    ) -> StepOutcome {
        let ctx = self.ctx.for_instance(&instance.id);
        let base = instance.base_path.as_path();

        let Some(exe_path) = instance.exe_path.as_deref() else {
            log_event!(
                ctx,
                ERROR,
                event_names::INSTANCE_SKIPPED,
                Stage::Discover,
                "Instance has no executable path"
            );
            return StepOutcome::SkipInstance(FailureReason::NoExecutablePath);
        };
        log_event!(
            ctx,
            INFO,
            event_names::INSTANCE_STARTED,
            Stage::Backup,
            "Updating instance",
            path = display(base.display())
        );

        match self.namer.move_aside(exe_path) {
            Ok(Some(backup)) => {
                log_event!(
                    ctx,
                    INFO,
                    event_names::BACKUP_RENAMED,
                    Stage::Backup,
                    "Executable moved aside",
                    to = display(backup.display())
                );
                outcome.backups.push(backup);
            }
            Ok(None) => {}
            Err(e) => {
                log_event!(
                    ctx,
                    ERROR,
                    event_names::BACKUP_RENAME_FAILED,
                    Stage::Backup,
                    "Cannot move executable aside",
                    file = display(exe_path.display()),
                    error = display(&e)
                );
                return StepOutcome::SkipInstance(FailureReason::BackupFailed {
                    error: e.to_string(),
                });
            }
        }

        // Live names are never pruned: every shipped file plus the canonical exe.
        let canonical = self.config.exe_file_name(&instance.id);
        let mut live: Vec<&str> = sources.iter().map(|(name, _)| name).collect();
        live.push(canonical.as_str());

        for (name, source) in sources.iter() {
            if name != self.config.source_exe_name {
                self.retire_auxiliary(&ctx, base, name, &live, outcome);
            }
            match fs::copy(source, base.join(name)) {
                Ok(_) => {
                    log_event!(
                        ctx,
                        DEBUG,
                        event_names::INSTALL_COPIED,
                        Stage::Install,
                        "Copied",
                        file = name
                    );
                    outcome.installed.push(name.to_string());
                }
                Err(e) => {
                    log_event!(
                        ctx,
                        ERROR,
                        event_names::INSTALL_COPY_FAILED,
                        Stage::Install,
                        "Copy failed",
                        file = name,
                        from = display(source.display()),
                        error = display(&e)
                    );
                    outcome.copy_failures.push(name.to_string());
                }
            }
        }

        let copied_exe = base.join(&self.config.source_exe_name);
        if let Err(e) = fs::rename(&copied_exe, exe_path) {
            log_event!(
                ctx,
                ERROR,
                event_names::INSTALL_RENAME_FAILED,
                Stage::Install,
                "Cannot rename executable",
                from = display(copied_exe.display()),
                to = display(exe_path.display()),
                error = display(&e)
            );
            return StepOutcome::SkipInstance(FailureReason::InstallFailed {
                error: e.to_string(),
            });
        }

        let verification = verify_installed_version(exe_path, &self.config.exe_version);
        outcome.version = verification.version.clone();
        if !verification.passed {
            log_event!(
                ctx,
                ERROR,
                event_names::VERIFY_MISMATCH,
                Stage::Verify,
                "Installed version does not match",
                expected = display(&verification.expected),
                actual = verification.version.as_deref().unwrap_or("-"),
                error = verification.error.as_deref().unwrap_or("-")
            );
            outcome.failure = Some(FailureReason::VersionMismatch {
                expected: verification.expected.clone(),
                actual: verification.version.clone(),
            });
            return StepOutcome::AbortRun(AbortReason::VersionMismatch {
                instance: instance.id.clone(),
                expected: verification.expected,
                actual: verification.version,
            });
        }
        log_event!(
            ctx,
            INFO,
            event_names::VERIFY_PASSED,
            Stage::Verify,
            "Version verified",
            version = display(&self.config.exe_version)
        );

        let pruned = prune_backups(
            base,
            &live,
            &[EXE_SUFFIX.to_string()],
            self.config.backup_retention,
        );
        self.record_prune(&ctx, pruned, outcome);

        let service = self.config.service_name(&instance.id);
        let report = restart_service(self.controller, &service);
        let restarted = report.succeeded();
        if restarted {
            log_event!(
                ctx,
                INFO,
                event_names::RESTART_OK,
                Stage::Restart,
                "Service restarted",
                service = display(&service),
                pid_before = display(pid_label(report.pid_before)),
                pid_after = display(pid_label(report.pid_after))
            );
        }
        outcome.restart = Some(report);
        if !restarted {
            log_event!(
                ctx,
                ERROR,
                event_names::RESTART_FAILED,
                Stage::Restart,
                "Service restart failed",
                service = display(&service),
                policy = display(&self.config.stop_policy)
            );
            return self.restart_failure(&ctx, &instance.id, service, outcome);
        }

        log_event!(
            ctx,
            INFO,
            event_names::INSTANCE_UPDATED,
            Stage::Restart,
            "Instance updated and restarted",
            service = display(&service),
            version = display(&self.config.exe_version)
        );
        StepOutcome::Continue
    }

    /// Move a live auxiliary file aside and trim that file's backups.
    fn retire_auxiliary(
        &self,
        ctx: &LogContext,
        base: &Path,
        name: &str,
        live: &[&str],
        outcome: &mut InstanceOutcome,
    ) {
        match self.namer.move_aside(&base.join(name)) {
            Ok(Some(backup)) => {
                log_event!(
                    ctx,
                    DEBUG,
                    event_names::BACKUP_RENAMED,
                    Stage::Backup,
                    "File moved aside",
                    file = name,
                    to = display(backup.display())
                );
                outcome.backups.push(backup);
            }
            Ok(None) => {}
            Err(e) => {
                log_event!(
                    ctx,
                    WARN,
                    event_names::BACKUP_RENAME_FAILED,
                    Stage::Backup,
                    "Cannot move file aside",
                    file = name,
                    error = display(&e)
                );
            }
        }

        // An empty suffix would match every file in the directory.
        let (_, suffix) = split_file_name(name);
        if suffix.is_empty() {
            return;
        }
        let pruned = prune_backups(
            base,
            live,
            &[suffix.to_string()],
            self.config.backup_retention,
        );
        self.record_prune(ctx, pruned, outcome);
    }

    fn record_prune(&self, ctx: &LogContext, pruned: PruneOutcome, outcome: &mut InstanceOutcome) {
        for failure in &pruned.failed {
            log_event!(
                ctx,
                WARN,
                event_names::PRUNE_FAILED,
                Stage::Prune,
                "Cannot delete old backup",
                file = display(failure.path.display()),
                error = display(&failure.error)
            );
        }
        for path in &pruned.deleted {
            log_event!(
                ctx,
                INFO,
                event_names::PRUNE_DELETED,
                Stage::Prune,
                "Deleted old backup",
                file = display(path.display())
            );
        }
        outcome.pruned.extend(pruned.deleted);
    }

    fn restart_failure(
        &self,
        ctx: &LogContext,
        instance: &str,
        service: String,
        outcome: &mut InstanceOutcome,
    ) -> StepOutcome {
        let policy = self.config.stop_policy.clone();
        outcome.failure = Some(FailureReason::RestartFailed {
            service: service.clone(),
            policy: policy.clone(),
        });
        match policy {
            StopPolicy::Abort => StepOutcome::AbortRun(AbortReason::RestartFailed {
                instance: instance.to_string(),
                service,
            }),
            StopPolicy::Continue => StepOutcome::SkipInstance(FailureReason::RestartFailed {
                service,
                policy,
            }),
            StopPolicy::Unrecognized(ref raw) => {
                log_event!(
                    ctx,
                    WARN,
                    event_names::POLICY_UNRECOGNIZED,
                    Stage::Restart,
                    "Unrecognized stop policy, continuing",
                    value = display(raw)
                );
                StepOutcome::SkipInstance(FailureReason::RestartFailed {
                    service,
                    policy: policy.clone(),
                })
            }
        }
    }
}
