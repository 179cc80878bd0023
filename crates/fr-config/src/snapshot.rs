//! Configuration snapshots for run logs.
//!
//! A snapshot captures which config file drove a run and the settings that
//! decide its outcome, so a rollout log can be audited later.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::load::LoadedConfig;
use crate::settings::StopPolicy;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Path the config was loaded from.
    pub path: String,

    /// How the path was resolved.
    pub source: String,

    /// SHA-256 hash of the config file content.
    pub content_hash: String,

    pub exe_version: String,
    pub backup_retention: usize,
    pub stop_policy: StopPolicy,
    pub service_manager: String,
}

impl ConfigSnapshot {
    /// Capture a snapshot of a loaded config.
    pub fn capture(loaded: &LoadedConfig) -> Self {
        Self {
            timestamp: Utc::now(),
            path: loaded.location.path.display().to_string(),
            source: loaded.location.source.to_string(),
            content_hash: loaded.content_hash.clone(),
            exe_version: loaded.config.exe_version.clone(),
            backup_retention: loaded.config.backup_retention,
            stop_policy: loaded.config.stop_policy.clone(),
            service_manager: loaded.config.service.manager.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::parse_config;
    use crate::resolve::{ConfigLocation, ConfigSource};
    use std::path::PathBuf;

    #[test]
    fn test_snapshot_serializes_policy() {
        let parsed = parse_config("[update]\nupdate_stop_flag = 1\nbackup_file_num = 4\n").unwrap();
        let loaded = LoadedConfig {
            config: parsed.config,
            location: ConfigLocation {
                path: PathBuf::from("/opt/fr/config/config.toml"),
                source: ConfigSource::ExecutableDir,
            },
            content_hash: "ab".repeat(32),
            notices: Vec::new(),
        };

        let snapshot = ConfigSnapshot::capture(&loaded);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["stop_policy"], "abort");
        assert_eq!(json["backup_retention"], 4);
        assert_eq!(json["source"], "executable directory");
    }
}
