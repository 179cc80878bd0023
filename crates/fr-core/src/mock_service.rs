//! Scripted service controller for testing.
//!
//! ```ignore
//! use fr_core::mock_service::MockServiceController;
//!
//! let mock = MockServiceController::new();
//! mock.add_running("trade007", 4100);
//! mock.fail_start("trade008");
//! ```
//!
//! Every stop/start is recorded as `"stop <name>"` / `"start <name>"` so tests
//! can assert on the exact call sequence.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use crate::service::{RunState, ServiceController, ServiceError};

const FIRST_PID: u32 = 5000;

#[derive(Debug, Clone)]
struct MockService {
    state: RunState,
    pid: Option<u32>,
}

#[derive(Debug, Default)]
pub struct MockServiceController {
    services: RefCell<BTreeMap<String, MockService>>,
    failing_stop: RefCell<BTreeSet<String>>,
    failing_start: RefCell<BTreeSet<String>>,
    sticky_pid: RefCell<BTreeSet<String>>,
    calls: RefCell<Vec<String>>,
    pid_counter: Cell<u32>,
}

impl MockServiceController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_running(&self, name: &str, pid: u32) {
        self.services.borrow_mut().insert(
            name.to_string(),
            MockService {
                state: RunState::Running,
                pid: Some(pid),
            },
        );
    }

    pub fn add_stopped(&self, name: &str) {
        self.services.borrow_mut().insert(
            name.to_string(),
            MockService {
                state: RunState::Stopped,
                pid: None,
            },
        );
    }

    /// `stop` reports an error and leaves the service as it was.
    pub fn fail_stop(&self, name: &str) {
        self.failing_stop.borrow_mut().insert(name.to_string());
    }

    /// `start` reports an error and leaves the service as it was.
    pub fn fail_start(&self, name: &str) {
        self.failing_start.borrow_mut().insert(name.to_string());
    }

    /// `start` succeeds but the service comes back with its old pid.
    pub fn keep_pid_on_restart(&self, name: &str) {
        self.sticky_pid.borrow_mut().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn state_of(&self, name: &str) -> Option<RunState> {
        self.services.borrow().get(name).map(|s| s.state)
    }

    fn next_pid(&self) -> u32 {
        let n = self.pid_counter.get();
        self.pid_counter.set(n + 1);
        FIRST_PID + n
    }

    fn with_service<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MockService) -> T,
    ) -> Result<T, ServiceError> {
        let mut services = self.services.borrow_mut();
        let service = services
            .get_mut(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
        Ok(f(service))
    }

    fn failure(name: &str, action: &'static str) -> ServiceError {
        ServiceError::CommandFailed {
            service: name.to_string(),
            action,
            message: "scripted failure".to_string(),
        }
    }
}

impl ServiceController for MockServiceController {
    fn query(&self, name: &str) -> Result<RunState, ServiceError> {
        self.with_service(name, |s| s.state)
    }

    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        self.calls.borrow_mut().push(format!("stop {}", name));
        if self.failing_stop.borrow().contains(name) {
            self.with_service(name, |_| ())?;
            return Err(Self::failure(name, "stop"));
        }
        let sticky = self.sticky_pid.borrow().contains(name);
        self.with_service(name, |s| {
            s.state = RunState::Stopped;
            if !sticky {
                s.pid = None;
            }
        })
    }

    fn start(&self, name: &str) -> Result<(), ServiceError> {
        self.calls.borrow_mut().push(format!("start {}", name));
        if self.failing_start.borrow().contains(name) {
            self.with_service(name, |_| ())?;
            return Err(Self::failure(name, "start"));
        }
        let sticky = self.sticky_pid.borrow().contains(name);
        let fresh = self.next_pid();
        self.with_service(name, |s| {
            s.state = RunState::Running;
            if !sticky || s.pid.is_none() {
                s.pid = Some(fresh);
            }
        })
    }

    fn process_id(&self, name: &str) -> Result<Option<u32>, ServiceError> {
        self.with_service(name, |s| s.pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_assigns_fresh_pid() {
        let mock = MockServiceController::new();
        mock.add_running("a", 1);
        mock.stop("a").unwrap();
        mock.start("a").unwrap();
        assert_eq!(mock.process_id("a").unwrap(), Some(FIRST_PID));
        assert_eq!(mock.state_of("a"), Some(RunState::Running));
    }

    #[test]
    fn test_sticky_pid_survives_restart() {
        let mock = MockServiceController::new();
        mock.add_running("a", 7);
        mock.keep_pid_on_restart("a");
        mock.stop("a").unwrap();
        mock.start("a").unwrap();
        assert_eq!(mock.process_id("a").unwrap(), Some(7));
    }

    #[test]
    fn test_unknown_service() {
        let mock = MockServiceController::new();
        assert!(matches!(mock.query("x"), Err(ServiceError::NotFound(_))));
        assert!(mock.start("x").is_err());
        assert_eq!(mock.calls(), vec!["start x"]);
    }
}
