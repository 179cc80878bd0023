//! Configuration path resolution.
//!
//! Resolution order: CLI argument → environment variable → `config/` next to
//! the running executable.

use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "FLEET_ROLLOUT_CONFIG";

/// Directory (next to the executable) holding the config file.
pub const CONFIG_DIR_NAME: &str = "config";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Where a configuration file path came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// The `config/` directory beside the executable.
    #[default]
    ExecutableDir,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ExecutableDir => write!(f, "executable directory"),
        }
    }
}

/// A resolved config file path and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub source: ConfigSource,
}

/// Resolve the config file path.
///
/// Explicit paths win even when the file is missing, so the caller reports
/// the path the operator actually asked for.
pub fn resolve_config_path(cli_path: Option<&Path>, exe_dir: &Path) -> ConfigLocation {
    if let Some(path) = cli_path {
        return ConfigLocation {
            path: path.to_path_buf(),
            source: ConfigSource::CliArgument,
        };
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.trim().is_empty() {
            return ConfigLocation {
                path: PathBuf::from(env_path),
                source: ConfigSource::Environment,
            };
        }
    }

    ConfigLocation {
        path: default_config_path(exe_dir),
        source: ConfigSource::ExecutableDir,
    }
}

/// `<exe_dir>/config/config.toml`.
pub fn default_config_path(exe_dir: &Path) -> PathBuf {
    exe_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Directory containing the running executable, or `.` when unknown.
pub fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
