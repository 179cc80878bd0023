//! Structured logging for rollout runs.
//!
//! Console output is human-readable by default or JSONL on request; stderr
//! carries it so stdout stays clean for command payloads. When a log
//! directory is configured, every record is also appended as JSONL to a
//! per-day file there.
//!
//! ```ignore
//! let config = LogConfig::from_env(None, None).with_log_dir(Some(dir));
//! init_logging(&config)?;
//!
//! let ctx = LogContext::new(generate_run_id(), get_host_id());
//! log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "Starting rollout");
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::{DailyLogFile, JsonlLayer};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Name of the log directory created beside the executable.
pub const LOG_DIR_NAME: &str = "updateLog";

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. Fails only
/// when the log directory cannot be created.
pub fn init_logging(config: &LogConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let file_layer = match &config.log_dir {
        Some(dir) => Some(JsonlLayer::new(DailyLogFile::new(dir)?)),
        None => None,
    };

    match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(file_layer)
                .init();
        }
        LogFormat::Jsonl => {
            tracing_subscriber::registry()
                .with(filter)
                .with(JsonlLayer::stderr())
                .with(file_layer)
                .init();
        }
    }
    Ok(())
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("run-{}", &uuid.to_string()[..12])
}

/// Get the host ID for logging.
///
/// Uses machine-id on Linux, then the hostname, then a random id.
pub fn get_host_id() -> String {
    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let id = id.trim();
        if id.len() >= 8 {
            return format!("host-{}", &id[..8]);
        }
    }

    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(hostname) = std::env::var(var) {
            if !hostname.is_empty() {
                return format!("host-{}", &hash_string(&hostname)[..8]);
            }
        }
    }

    format!("host-{}", &uuid::Uuid::new_v4().to_string()[..8])
}

fn hash_string(s: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Structured event logging with run correlation.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::BACKUP_RENAMED, Stage::Backup, "Moved aside",
///     to = display(dst.display()));
/// ```
#[macro_export]
macro_rules! log_event {
    (@emit $level:ident, $ctx:expr, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::$level!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            instance_id = $ctx.instance_id.as_deref().unwrap_or("-"),
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
    ($ctx:expr, INFO, $($rest:tt)+) => { $crate::log_event!(@emit info, $ctx, $($rest)+) };
    ($ctx:expr, DEBUG, $($rest:tt)+) => { $crate::log_event!(@emit debug, $ctx, $($rest)+) };
    ($ctx:expr, WARN, $($rest:tt)+) => { $crate::log_event!(@emit warn, $ctx, $($rest)+) };
    ($ctx:expr, ERROR, $($rest:tt)+) => { $crate::log_event!(@emit error, $ctx, $($rest)+) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();

        assert!(id1.starts_with("run-"));
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 16);
    }

    #[test]
    fn test_get_host_id() {
        let host_id = get_host_id();
        assert!(host_id.starts_with("host-"));
        assert!(host_id.len() >= 13);
    }

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Human);
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
    }
}
