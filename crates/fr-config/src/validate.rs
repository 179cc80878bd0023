//! Configuration validation errors and semantic validation.

use std::path::PathBuf;
use thiserror::Error;

use crate::settings::UpdateConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{field} does not name a directory: {path}")]
    NotADirectory { field: String, path: PathBuf },
}

/// Validate a parsed configuration.
///
/// Hard errors are values no run could use. Everything that only degrades a
/// run (an empty marker, a missing directory) comes back as a warning, since
/// discovery and source resolution already log and skip those cases.
pub fn validate_config(config: &UpdateConfig) -> ValidationResult<Vec<String>> {
    let mut warnings = Vec::new();

    if config.service.timeout_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "service.timeout_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.source_dir.is_file() {
        return Err(ValidationError::NotADirectory {
            field: "update.source_dir".to_string(),
            path: config.source_dir.clone(),
        });
    }
    if config.target_dir.is_file() {
        return Err(ValidationError::NotADirectory {
            field: "update.target_dir".to_string(),
            path: config.target_dir.clone(),
        });
    }

    if config.exe_version.trim().is_empty() {
        warnings.push(
            "signature.exe_version is empty; every installed executable will fail verification"
                .to_string(),
        );
    }
    if config.author.trim().is_empty() {
        warnings.push("signature.author is empty; backup names carry no signer tag".to_string());
    }
    if config.source_exe_name.trim().is_empty() {
        warnings.push("update.source_exe_name is empty".to_string());
    }
    if config.server_type.is_empty() {
        warnings.push(
            "update.server_type is empty; it matches every sub-directory, so instances with more than one sub-directory are skipped"
                .to_string(),
        );
    }
    if config.server_prefix.contains('/') || config.server_prefix.contains('\\') {
        warnings.push(format!(
            "update.server_prefix {:?} contains a path separator; no executable path can be resolved",
            config.server_prefix
        ));
    }
    if config.source_suffixes.is_empty() {
        warnings.push("update.source_file_suffix is empty; nothing will be copied".to_string());
    }
    if !config.source_dir.is_dir() {
        warnings.push(format!(
            "update.source_dir {} does not exist",
            config.source_dir.display()
        ));
    }
    if !config.target_dir.is_dir() {
        warnings.push(format!(
            "update.target_dir {} does not exist",
            config.target_dir.display()
        ));
    }
    if let crate::StopPolicy::Unrecognized(raw) = &config.stop_policy {
        warnings.push(format!(
            "update.update_stop_flag {} is not recognized; restart failures will not stop the run",
            raw
        ));
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ServiceSettings, StopPolicy};
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> UpdateConfig {
        let source = temp.path().join("staging");
        let target = temp.path().join("srv");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&target).unwrap();
        UpdateConfig {
            author: "ops".into(),
            exe_version: "1.0.0.1".into(),
            source_dir: source,
            source_exe_name: "app.exe".into(),
            source_suffixes: vec![".exe".into()],
            target_dir: target,
            server_type: "trade".into(),
            server_prefix: "trade".into(),
            excluded_ids: String::new(),
            backup_retention: 3,
            stop_policy: StopPolicy::Continue,
            service: ServiceSettings::default(),
        }
    }

    #[test]
    fn test_complete_config_has_no_warnings() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        assert!(validate_config(&config).unwrap().is_empty());
    }

    #[test]
    fn test_zero_timeout_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp);
        config.service.timeout_secs = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "service.timeout_secs"
        ));
    }

    #[test]
    fn test_file_as_target_dir_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp);
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        config.target_dir = file;
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_degraded_values_warn() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp);
        config.exe_version.clear();
        config.server_prefix = "bad/prefix".into();
        config.stop_policy = StopPolicy::Unrecognized("9".into());
        config.source_dir = temp.path().join("missing");

        let warnings = validate_config(&config).unwrap();
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().any(|w| w.contains("exe_version")));
        assert!(warnings.iter().any(|w| w.contains("path separator")));
        assert!(warnings.iter().any(|w| w.contains("not recognized")));
        assert!(warnings.iter().any(|w| w.contains("does not exist")));
    }
}
