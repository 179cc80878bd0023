//! Loading the rollout config file.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use crate::resolve::ConfigLocation;
use crate::settings::{
    retention_from_value, split_suffixes, RawConfig, ServiceManagerKind, ServiceSettings, StopPolicy,
    UpdateConfig,
};
use crate::validate::{validate_config, ValidationError};
use crate::DEFAULT_SERVICE_TIMEOUT_SECS;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Semantic validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config file already exists: {path}")]
    AlreadyExists { path: PathBuf },
}

/// A config parsed from text, with notices about lenient fallbacks.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub config: UpdateConfig,
    pub notices: Vec<String>,
}

/// A config loaded from disk with provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: UpdateConfig,
    pub location: ConfigLocation,
    /// SHA-256 of the file content.
    pub content_hash: String,
    /// Parse fallbacks and validation warnings, in that order.
    pub notices: Vec<String>,
}

/// Parse config text into an [`UpdateConfig`].
pub fn parse_config(content: &str) -> Result<ParsedConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(content)?;
    let mut notices = Vec::new();

    let backup_retention = retention_from_value(raw.update.backup_file_num.as_ref(), &mut notices);

    let stop_policy = raw
        .update
        .update_stop_flag
        .as_ref()
        .map(StopPolicy::from_value)
        .unwrap_or_default();

    let manager = match raw.service.manager.as_deref() {
        Some(name) => name.parse::<ServiceManagerKind>().map_err(|message| ValidationError::InvalidValue {
            field: "service.manager".to_string(),
            message,
        })?,
        None => ServiceManagerKind::default(),
    };

    let config = UpdateConfig {
        author: raw.signature.author.trim().to_string(),
        exe_version: raw.signature.exe_version.trim().to_string(),
        source_dir: PathBuf::from(raw.update.source_dir.trim()),
        source_exe_name: raw.update.source_exe_name.trim().to_string(),
        source_suffixes: split_suffixes(&raw.update.source_file_suffix),
        target_dir: PathBuf::from(raw.update.target_dir.trim()),
        server_type: raw.update.server_type.trim().to_string(),
        server_prefix: raw.update.server_prefix.trim().to_string(),
        excluded_ids: raw.update.not_update_serverid,
        backup_retention,
        stop_policy,
        service: ServiceSettings {
            manager,
            timeout_secs: raw.service.timeout_secs.unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS),
        },
    };

    Ok(ParsedConfig { config, notices })
}

/// Load, parse and validate the config at `location`.
pub fn load_config(location: ConfigLocation) -> Result<LoadedConfig, ConfigError> {
    let content = std::fs::read_to_string(&location.path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: location.path.clone(),
            }
        } else {
            ConfigError::Io {
                path: location.path.clone(),
                source,
            }
        }
    })?;

    let content_hash = hex::encode(Sha256::digest(content.as_bytes()));
    let ParsedConfig {
        config,
        mut notices,
    } = parse_config(&content)?;

    notices.extend(validate_config(&config)?);
    for notice in &notices {
        warn!(target: "config.notice", path = %location.path.display(), "{}", notice);
    }
    debug!(
        target: "config.loaded",
        path = %location.path.display(),
        source = %location.source,
        hash = %content_hash,
        "Config loaded"
    );

    Ok(LoadedConfig {
        config,
        location,
        content_hash,
        notices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConfigSource;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[signature]
author = "ops"
exe_version = "1.0.0.1"

[update]
source_dir = "/srv/staging"
source_file_suffix = ".exe,.dat"
source_exe_name = "app.exe"
target_dir = "/srv/trade"
server_type = "trade"
server_prefix = "trade"
not_update_serverid = "001,002"
backup_file_num = 2
update_stop_flag = 1

[service]
manager = "scm"
timeout_secs = 15
"#;

    #[test]
    fn test_parse_full_config() {
        let parsed = parse_config(SAMPLE).unwrap();
        let config = parsed.config;
        assert!(parsed.notices.is_empty());
        assert_eq!(config.author, "ops");
        assert_eq!(config.exe_version, "1.0.0.1");
        assert_eq!(config.source_suffixes, vec![".exe", ".dat"]);
        assert_eq!(config.excluded_ids, "001,002");
        assert_eq!(config.backup_retention, 2);
        assert_eq!(config.stop_policy, StopPolicy::Abort);
        assert_eq!(config.service.manager, ServiceManagerKind::Scm);
        assert_eq!(config.service.timeout_secs, 15);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let parsed = parse_config("").unwrap();
        assert_eq!(parsed.config.backup_retention, 3);
        assert_eq!(parsed.config.stop_policy, StopPolicy::Continue);
        assert_eq!(parsed.config.service.timeout_secs, DEFAULT_SERVICE_TIMEOUT_SECS);
        assert!(parsed.config.source_suffixes.is_empty());
    }

    #[test]
    fn test_parse_garbled_retention_notes_fallback() {
        let parsed = parse_config("[update]\nbackup_file_num = \"lots\"\n").unwrap();
        assert_eq!(parsed.config.backup_retention, 3);
        assert_eq!(parsed.notices.len(), 1);
    }

    #[test]
    fn test_unknown_manager_is_rejected() {
        let err = parse_config("[service]\nmanager = \"launchd\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        assert!(matches!(
            parse_config("[update\nsource_dir = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let location = ConfigLocation {
            path: temp.path().join("nope.toml"),
            source: ConfigSource::CliArgument,
        };
        assert!(matches!(
            load_config(location),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_records_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let loaded = load_config(ConfigLocation {
            path,
            source: ConfigSource::CliArgument,
        })
        .unwrap();

        assert_eq!(loaded.content_hash.len(), 64);
        // The sample's directories do not exist here.
        assert!(loaded.notices.iter().any(|n| n.contains("does not exist")));
    }
}
