//! Rollout configuration types.
//!
//! The on-disk file keeps the `[signature]` / `[update]` split of the legacy
//! INI layout so existing operators can port their settings key-for-key.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{DEFAULT_BACKUP_RETENTION, DEFAULT_SERVICE_TIMEOUT_SECS};

/// What the driver does after an instance's service fails to restart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Count the failure and move on to the next instance.
    #[default]
    Continue,
    /// Stop the whole rollout.
    Abort,
    /// A value we do not know; logged and handled like `Continue`.
    Unrecognized(String),
}

impl StopPolicy {
    /// Interpret a raw `update_stop_flag` value.
    ///
    /// Integers follow the legacy numbering (0 = continue, 1 = stop).
    pub fn from_value(value: &toml::Value) -> Self {
        match value {
            toml::Value::Integer(0) => StopPolicy::Continue,
            toml::Value::Integer(1) => StopPolicy::Abort,
            toml::Value::String(s) => match s.trim().to_lowercase().as_str() {
                "0" | "continue" => StopPolicy::Continue,
                "1" | "stop" | "abort" => StopPolicy::Abort,
                _ => StopPolicy::Unrecognized(s.clone()),
            },
            other => StopPolicy::Unrecognized(other.to_string()),
        }
    }
}

impl std::fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopPolicy::Continue => write!(f, "continue"),
            StopPolicy::Abort => write!(f, "abort"),
            StopPolicy::Unrecognized(raw) => write!(f, "unrecognized({})", raw),
        }
    }
}

/// Which service manager owns the instance services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceManagerKind {
    /// systemd units driven through `systemctl`.
    Systemd,
    /// Windows Service Control Manager driven through `sc.exe`.
    Scm,
}

impl Default for ServiceManagerKind {
    fn default() -> Self {
        if cfg!(windows) {
            ServiceManagerKind::Scm
        } else {
            ServiceManagerKind::Systemd
        }
    }
}

impl std::str::FromStr for ServiceManagerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "systemd" | "systemctl" => Ok(ServiceManagerKind::Systemd),
            "scm" | "sc" | "windows" => Ok(ServiceManagerKind::Scm),
            _ => Err(format!("unknown service manager: {}", s)),
        }
    }
}

impl std::fmt::Display for ServiceManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceManagerKind::Systemd => write!(f, "systemd"),
            ServiceManagerKind::Scm => write!(f, "scm"),
        }
    }
}

/// Service control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSettings {
    pub manager: ServiceManagerKind,
    pub timeout_secs: u64,
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            manager: ServiceManagerKind::default(),
            timeout_secs: DEFAULT_SERVICE_TIMEOUT_SECS,
        }
    }
}

/// Immutable per-run settings handed to the update driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateConfig {
    /// Signer tag embedded in every backup name.
    pub author: String,
    /// Version the installed executable must report.
    pub exe_version: String,
    /// Directory holding the staged files.
    pub source_dir: PathBuf,
    /// File name of the main executable inside `source_dir`.
    pub source_exe_name: String,
    /// Suffixes selecting which staged files ship.
    pub source_suffixes: Vec<String>,
    /// Root containing one directory per instance.
    pub target_dir: PathBuf,
    /// Marker naming the instance sub-directory to update.
    pub server_type: String,
    /// Prefix of service names and executable names.
    pub server_prefix: String,
    /// Raw comma-separated list of instance ids to leave alone.
    ///
    /// Kept verbatim: exclusion is a substring test against this string.
    pub excluded_ids: String,
    /// Backups kept per file category.
    pub backup_retention: usize,
    pub stop_policy: StopPolicy,
    pub service: ServiceSettings,
}

impl UpdateConfig {
    /// Service name for an instance id.
    pub fn service_name(&self, instance_id: &str) -> String {
        format!("{}{}", self.server_prefix, instance_id)
    }

    /// Canonical executable file name for an instance id.
    pub fn exe_file_name(&self, instance_id: &str) -> String {
        format!("{}{}.exe", self.server_prefix, instance_id)
    }
}

/// Split the comma-separated suffix list, dropping empty entries.
pub fn split_suffixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ----------------------------------------------------------------------------
// Raw file shape
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawConfig {
    pub signature: RawSignature,
    pub update: RawUpdate,
    pub service: RawService,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawSignature {
    pub author: String,
    pub exe_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawUpdate {
    pub source_dir: String,
    pub source_file_suffix: String,
    pub source_exe_name: String,
    pub target_dir: String,
    pub server_type: String,
    pub server_prefix: String,
    pub not_update_serverid: String,
    pub backup_file_num: Option<toml::Value>,
    pub update_stop_flag: Option<toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawService {
    pub manager: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Interpret `backup_file_num`, falling back to the default on anything odd.
pub(crate) fn retention_from_value(value: Option<&toml::Value>, notices: &mut Vec<String>) -> usize {
    match value {
        None => DEFAULT_BACKUP_RETENTION,
        Some(toml::Value::Integer(n)) if *n >= 0 => *n as usize,
        Some(toml::Value::String(s)) => match s.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                notices.push(format!(
                    "backup_file_num {:?} is not a count; using {}",
                    s, DEFAULT_BACKUP_RETENTION
                ));
                DEFAULT_BACKUP_RETENTION
            }
        },
        Some(other) => {
            notices.push(format!(
                "backup_file_num {} is not a count; using {}",
                other, DEFAULT_BACKUP_RETENTION
            ));
            DEFAULT_BACKUP_RETENTION
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_policy_from_integers() {
        assert_eq!(
            StopPolicy::from_value(&toml::Value::Integer(0)),
            StopPolicy::Continue
        );
        assert_eq!(
            StopPolicy::from_value(&toml::Value::Integer(1)),
            StopPolicy::Abort
        );
        assert_eq!(
            StopPolicy::from_value(&toml::Value::Integer(7)),
            StopPolicy::Unrecognized("7".to_string())
        );
    }

    #[test]
    fn test_stop_policy_from_strings() {
        assert_eq!(
            StopPolicy::from_value(&toml::Value::String("stop".into())),
            StopPolicy::Abort
        );
        assert_eq!(
            StopPolicy::from_value(&toml::Value::String("Continue".into())),
            StopPolicy::Continue
        );
        assert!(matches!(
            StopPolicy::from_value(&toml::Value::String("later".into())),
            StopPolicy::Unrecognized(_)
        ));
    }

    #[test]
    fn test_split_suffixes_drops_empty_entries() {
        assert_eq!(split_suffixes(".exe, .dll,,"), vec![".exe", ".dll"]);
        assert!(split_suffixes("").is_empty());
    }

    #[test]
    fn test_retention_fallbacks() {
        let mut notices = Vec::new();
        assert_eq!(retention_from_value(None, &mut notices), 3);
        assert_eq!(
            retention_from_value(Some(&toml::Value::Integer(5)), &mut notices),
            5
        );
        assert_eq!(
            retention_from_value(Some(&toml::Value::Integer(-1)), &mut notices),
            3
        );
        assert_eq!(
            retention_from_value(Some(&toml::Value::String("two".into())), &mut notices),
            3
        );
        assert_eq!(notices.len(), 2);
    }

    #[test]
    fn test_names_for_instance() {
        let config = UpdateConfig {
            author: "ops".into(),
            exe_version: "1.0.0.1".into(),
            source_dir: PathBuf::from("/staging"),
            source_exe_name: "app.exe".into(),
            source_suffixes: vec![".exe".into()],
            target_dir: PathBuf::from("/srv"),
            server_type: "trade".into(),
            server_prefix: "trade".into(),
            excluded_ids: String::new(),
            backup_retention: 3,
            stop_policy: StopPolicy::Continue,
            service: ServiceSettings::default(),
        };
        assert_eq!(config.service_name("007"), "trade007");
        assert_eq!(config.exe_file_name("007"), "trade007.exe");
    }
}
