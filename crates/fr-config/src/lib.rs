//! Fleet rollout configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the rollout `config.toml`
//! - Config path resolution (CLI → env → executable directory)
//! - Lenient scalar parsing with recorded notices
//! - Semantic validation
//! - First-run template bootstrap
//! - Config snapshots for run logs

pub mod load;
pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod template;
pub mod validate;

pub use load::{load_config, parse_config, ConfigError, LoadedConfig, ParsedConfig};
pub use resolve::{resolve_config_path, ConfigLocation, ConfigSource};
pub use settings::{ServiceManagerKind, ServiceSettings, StopPolicy, UpdateConfig};
pub use snapshot::ConfigSnapshot;
pub use template::{write_template, CONFIG_TEMPLATE};
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Backup files kept per category when the config omits or garbles the count.
pub const DEFAULT_BACKUP_RETENTION: usize = 3;

/// Default timeout for a single service stop/start.
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 60;
