//! Service control for restarting instances after an install.
//!
//! The driver talks to a [`ServiceController`]; `systemd` and the Windows
//! service control manager are the two shipped implementations. Both block
//! on stop/start until the service reaches the requested state or the
//! configured timeout expires.

pub mod command;
pub mod scm;
pub mod systemd;

pub use scm::ScmController;
pub use systemd::SystemdController;

use std::time::{Duration, Instant};

use fr_config::{ServiceManagerKind, ServiceSettings};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Errors from service-manager calls.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("service manager not available: {0}")]
    Unavailable(String),

    #[error("{action} {service} failed: {message}")]
    CommandFailed {
        service: String,
        action: &'static str,
        message: String,
    },

    #[error("{service}: timed out after {timeout:?}")]
    Timeout { service: String, timeout: Duration },

    #[error("unexpected output for {service}: {message}")]
    UnexpectedOutput { service: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse run state shared by all service managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Stopped,
    StartPending,
    StopPending,
    Paused,
    Failed,
    Unknown,
}

impl RunState {
    pub fn is_running(self) -> bool {
        self == RunState::Running
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Running => "running",
            RunState::Stopped => "stopped",
            RunState::StartPending => "start_pending",
            RunState::StopPending => "stop_pending",
            RunState::Paused => "paused",
            RunState::Failed => "failed",
            RunState::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Operations the update driver needs from a service manager.
///
/// `stop` and `start` block until the target state or the controller's
/// timeout.
pub trait ServiceController {
    fn query(&self, name: &str) -> Result<RunState, ServiceError>;
    fn stop(&self, name: &str) -> Result<(), ServiceError>;
    fn start(&self, name: &str) -> Result<(), ServiceError>;
    /// `None` when the service has no running process.
    fn process_id(&self, name: &str) -> Result<Option<u32>, ServiceError>;

    /// Confirm the manager itself can be reached.
    fn check_available(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Build the controller selected in configuration.
pub fn controller_for(settings: &ServiceSettings) -> Box<dyn ServiceController> {
    match settings.manager {
        ServiceManagerKind::Systemd => Box::new(SystemdController::new(settings.timeout())),
        ServiceManagerKind::Scm => Box::new(ScmController::new(settings.timeout())),
    }
}

/// Poll `query` until the service reaches `target` or `timeout` elapses.
pub fn wait_for_state(
    controller: &dyn ServiceController,
    name: &str,
    target: RunState,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServiceError> {
    let start = Instant::now();
    loop {
        if controller.query(name)? == target {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(ServiceError::Timeout {
                service: name.to_string(),
                timeout,
            });
        }
        std::thread::sleep(interval);
    }
}

/// What happened during one restart attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    pub service: String,
    pub pid_before: Option<u32>,
    pub pid_after: Option<u32>,
    pub state_before: Option<RunState>,
    pub state_after: Option<RunState>,
    /// Stop/start errors, logged but not fatal on their own.
    pub errors: Vec<String>,
}

impl RestartReport {
    /// A restart took effect only if the process changed and the service runs.
    pub fn succeeded(&self) -> bool {
        self.state_before.is_some()
            && self.pid_before != self.pid_after
            && self.state_after.is_some_and(RunState::is_running)
    }
}

/// Restart `name`: stop+start when running, start otherwise.
///
/// A failed initial query ends the attempt. Stop and start errors are
/// recorded and the attempt carries on; the outcome is decided by
/// [`RestartReport::succeeded`].
pub fn restart_service(controller: &dyn ServiceController, name: &str) -> RestartReport {
    let mut report = RestartReport {
        service: name.to_string(),
        pid_before: controller.process_id(name).unwrap_or(None),
        pid_after: None,
        state_before: None,
        state_after: None,
        errors: Vec::new(),
    };

    let state = match controller.query(name) {
        Ok(state) => state,
        Err(e) => {
            warn!(service = name, error = %e, "Service query failed");
            report.errors.push(format!("query: {}", e));
            return report;
        }
    };
    report.state_before = Some(state);

    if state.is_running() {
        if let Err(e) = controller.stop(name) {
            warn!(service = name, error = %e, "Service stop failed");
            report.errors.push(format!("stop: {}", e));
        }
    }
    if let Err(e) = controller.start(name) {
        warn!(service = name, error = %e, "Service start failed");
        report.errors.push(format!("start: {}", e));
    }

    report.pid_after = controller.process_id(name).unwrap_or(None);
    report.state_after = controller.query(name).ok();
    report
}
