//! First-run config bootstrap.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::load::ConfigError;

/// Commented starting point written by `config init`.
pub const CONFIG_TEMPLATE: &str = r#"# [signature]
#   author       signer tag written into every backup file name
#   exe_version  version the installed executable must report; the run stops
#                at the first instance that does not match
[signature]
author = "ops"
exe_version = "1.0.0.1"

# [update]
#   source_dir           directory holding the staged files
#   source_file_suffix   comma-separated suffixes selecting files to ship
#   source_exe_name      main executable inside source_dir
#   target_dir           root with one directory per instance id
#   server_type          marker naming the instance sub-directory to update;
#                        exactly one sub-directory per instance may contain it
#   server_prefix        prefix of service and executable names
#   not_update_serverid  comma-separated instance ids to skip
#   backup_file_num      backups kept per file type; the oldest extras go
#   update_stop_flag     0 = continue after a failed restart, 1 = stop the run
[update]
source_dir = ""
source_file_suffix = ""
source_exe_name = ""
target_dir = ""
server_type = ""
server_prefix = ""
not_update_serverid = ""
backup_file_num = 3
update_stop_flag = 0

# [service]
#   manager       "systemd" or "scm"
#   timeout_secs  upper bound for a single stop or start
[service]
timeout_secs = 60
"#;

/// Write [`CONFIG_TEMPLATE`] to `path`, creating parent directories.
///
/// Never overwrites an existing file.
pub fn write_template(path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(io_err(e)),
    };
    file.write_all(CONFIG_TEMPLATE.as_bytes()).map_err(io_err)?;

    tracing::info!(target: "config.bootstrap", path = %path.display(), "Wrote config template");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::parse_config;
    use tempfile::TempDir;

    #[test]
    fn test_template_parses() {
        let parsed = parse_config(CONFIG_TEMPLATE).unwrap();
        assert_eq!(parsed.config.backup_retention, 3);
        assert!(parsed.notices.is_empty());
    }

    #[test]
    fn test_write_template_creates_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config").join("config.toml");
        write_template(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);
    }

    #[test]
    fn test_write_template_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "keep me").unwrap();

        assert!(matches!(
            write_template(&path),
            Err(ConfigError::AlreadyExists { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }
}
