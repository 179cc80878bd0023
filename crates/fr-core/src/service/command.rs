//! Bounded execution of service-manager commands.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use super::ServiceError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run a command, killing it once `timeout` elapses.
pub fn run_with_timeout(binary: &str, args: &[&str], timeout: Duration) -> io::Result<Output> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let start = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => {
                let stdout = child.stdout.take().map_or(Vec::new(), |mut s| {
                    let mut buf = Vec::new();
                    let _ = s.read_to_end(&mut buf);
                    buf
                });
                let stderr = child.stderr.take().map_or(Vec::new(), |mut s| {
                    let mut buf = Vec::new();
                    let _ = s.read_to_end(&mut buf);
                    buf
                });
                return Ok(Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            None => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("command timed out after {:?}", timeout),
                    ));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Run a service-manager command and translate spawn failures and timeouts.
///
/// A non-zero exit status is returned as-is; callers decide what it means.
pub fn invoke(
    binary: &str,
    args: &[&str],
    service: &str,
    timeout: Duration,
) -> Result<Output, ServiceError> {
    run_with_timeout(binary, args, timeout).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ServiceError::Unavailable(binary.to_string()),
        io::ErrorKind::TimedOut => ServiceError::Timeout {
            service: service.to_string(),
            timeout,
        },
        _ => ServiceError::Io(e),
    })
}

/// Combined, trimmed stdout and stderr for error messages.
pub fn describe_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = stderr.trim().to_string();
    if text.is_empty() {
        text = stdout.trim().to_string();
    }
    format!("{} ({})", text, output.status)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_timeout_captures_output() {
        let output = run_with_timeout("sh", &["-c", "echo hello"], Duration::from_secs(5)).unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn test_run_with_timeout_kills_slow_command() {
        let err = run_with_timeout("sleep", &["5"], Duration::from_millis(100)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let err = invoke(
            "fleet-rollout-no-such-binary",
            &[],
            "trade007",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }
}
