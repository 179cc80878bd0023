//! systemd controller backed by `systemctl`.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::command::{describe_output, invoke};
use super::{RunState, ServiceController, ServiceError};

const SYSTEMCTL: &str = "systemctl";
const SHOW_PROPERTIES: &str = "LoadState,ActiveState,MainPID";

/// Properties read from `systemctl show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub state: RunState,
    pub main_pid: Option<u32>,
}

/// Parse key=value properties from systemctl output.
fn parse_properties(output: &str) -> HashMap<&str, &str> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

fn state_from_active(value: &str) -> RunState {
    match value {
        "active" | "reloading" => RunState::Running,
        "activating" => RunState::StartPending,
        "deactivating" => RunState::StopPending,
        "inactive" => RunState::Stopped,
        "failed" => RunState::Failed,
        _ => RunState::Unknown,
    }
}

/// Interpret `systemctl show --property=LoadState,ActiveState,MainPID`.
///
/// Returns `None` when the unit does not exist.
pub fn parse_show_output(output: &str) -> Option<UnitStatus> {
    let props = parse_properties(output);
    if props.get("LoadState").copied() == Some("not-found") {
        return None;
    }
    let state = props
        .get("ActiveState")
        .map(|s| state_from_active(s))
        .unwrap_or(RunState::Unknown);
    let main_pid = props
        .get("MainPID")
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&p| p > 0);
    Some(UnitStatus { state, main_pid })
}

pub struct SystemdController {
    timeout: Duration,
}

impl SystemdController {
    pub fn new(timeout: Duration) -> Self {
        SystemdController { timeout }
    }

    fn show(&self, name: &str) -> Result<UnitStatus, ServiceError> {
        let property = format!("--property={}", SHOW_PROPERTIES);
        let output = invoke(SYSTEMCTL, &["show", &property, name], name, self.timeout)?;
        if !output.status.success() {
            return Err(ServiceError::CommandFailed {
                service: name.to_string(),
                action: "show",
                message: describe_output(&output),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_show_output(&stdout).ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }

    fn control(&self, name: &str, action: &'static str) -> Result<(), ServiceError> {
        debug!(service = name, action, "systemctl");
        let output = invoke(SYSTEMCTL, &[action, name], name, self.timeout)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ServiceError::CommandFailed {
                service: name.to_string(),
                action,
                message: describe_output(&output),
            })
        }
    }
}

impl ServiceController for SystemdController {
    fn query(&self, name: &str) -> Result<RunState, ServiceError> {
        self.show(name).map(|status| status.state)
    }

    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        self.control(name, "stop")
    }

    fn start(&self, name: &str) -> Result<(), ServiceError> {
        self.control(name, "start")
    }

    fn process_id(&self, name: &str) -> Result<Option<u32>, ServiceError> {
        self.show(name).map(|status| status.main_pid)
    }

    fn check_available(&self) -> Result<(), ServiceError> {
        invoke(SYSTEMCTL, &["--version"], SYSTEMCTL, self.timeout).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show_running() {
        let out = "LoadState=loaded\nActiveState=active\nMainPID=4242\n";
        assert_eq!(
            parse_show_output(out),
            Some(UnitStatus {
                state: RunState::Running,
                main_pid: Some(4242)
            })
        );
    }

    #[test]
    fn test_parse_show_inactive_zero_pid() {
        let out = "LoadState=loaded\nActiveState=inactive\nMainPID=0\n";
        let status = parse_show_output(out).unwrap();
        assert_eq!(status.state, RunState::Stopped);
        assert_eq!(status.main_pid, None);
    }

    #[test]
    fn test_parse_show_not_found() {
        let out = "LoadState=not-found\nActiveState=inactive\nMainPID=0\n";
        assert_eq!(parse_show_output(out), None);
    }

    #[test]
    fn test_parse_show_transitional_states() {
        assert_eq!(state_from_active("activating"), RunState::StartPending);
        assert_eq!(state_from_active("deactivating"), RunState::StopPending);
        assert_eq!(state_from_active("failed"), RunState::Failed);
        assert_eq!(state_from_active("maintenance"), RunState::Unknown);
    }

    #[test]
    fn test_parse_show_missing_properties() {
        let status = parse_show_output("").unwrap();
        assert_eq!(status.state, RunState::Unknown);
        assert_eq!(status.main_pid, None);
    }
}
