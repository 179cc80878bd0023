//! Windows service control manager via `sc.exe`.
//!
//! `sc stop` and `sc start` return as soon as the request is queued, so both
//! are followed by polling `sc queryex` until the service settles.

use std::time::Duration;

use tracing::debug;

use super::command::{describe_output, invoke};
use super::{wait_for_state, RunState, ServiceController, ServiceError};

const SC: &str = "sc";
const SETTLE_INTERVAL: Duration = Duration::from_millis(500);
/// `ERROR_SERVICE_DOES_NOT_EXIST`
const ERROR_SERVICE_DOES_NOT_EXIST: &str = "1060";

/// Fields read from `sc queryex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEx {
    pub state: RunState,
    pub pid: Option<u32>,
}

fn state_from_code(code: u32) -> RunState {
    match code {
        1 => RunState::Stopped,
        2 => RunState::StartPending,
        3 => RunState::StopPending,
        4 => RunState::Running,
        5 => RunState::StartPending,
        6 => RunState::StopPending,
        7 => RunState::Paused,
        _ => RunState::Unknown,
    }
}

/// Value after the colon on the first line whose key is `key`.
fn field<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim())
    })
}

/// Parse `sc queryex <name>` output. `None` when no STATE line is present.
pub fn parse_queryex_output(output: &str) -> Option<QueryEx> {
    let state = field(output, "STATE")?
        .split_whitespace()
        .next()
        .and_then(|code| code.parse::<u32>().ok())
        .map(state_from_code)?;
    let pid = field(output, "PID")
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&p| p > 0);
    Some(QueryEx { state, pid })
}

pub struct ScmController {
    timeout: Duration,
}

impl ScmController {
    pub fn new(timeout: Duration) -> Self {
        ScmController { timeout }
    }

    fn queryex(&self, name: &str) -> Result<QueryEx, ServiceError> {
        let output = invoke(SC, &["queryex", name], name, self.timeout)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains(ERROR_SERVICE_DOES_NOT_EXIST) {
            return Err(ServiceError::NotFound(name.to_string()));
        }
        parse_queryex_output(&stdout).ok_or_else(|| ServiceError::UnexpectedOutput {
            service: name.to_string(),
            message: describe_output(&output),
        })
    }

    fn control(&self, name: &str, action: &'static str, target: RunState) -> Result<(), ServiceError> {
        debug!(service = name, action, "sc");
        let output = invoke(SC, &[action, name], name, self.timeout)?;
        if !output.status.success() {
            return Err(ServiceError::CommandFailed {
                service: name.to_string(),
                action,
                message: describe_output(&output),
            });
        }
        wait_for_state(self, name, target, self.timeout, SETTLE_INTERVAL)
    }
}

impl ServiceController for ScmController {
    fn query(&self, name: &str) -> Result<RunState, ServiceError> {
        self.queryex(name).map(|q| q.state)
    }

    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        self.control(name, "stop", RunState::Stopped)
    }

    fn start(&self, name: &str) -> Result<(), ServiceError> {
        self.control(name, "start", RunState::Running)
    }

    fn process_id(&self, name: &str) -> Result<Option<u32>, ServiceError> {
        self.queryex(name).map(|q| q.pid)
    }

    fn check_available(&self) -> Result<(), ServiceError> {
        invoke(SC, &["query", "type=", "service", "state=", "inactive"], SC, self.timeout)
            .map(|_| ())
    }
}
