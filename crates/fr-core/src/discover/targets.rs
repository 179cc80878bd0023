//! Instance directory discovery under the target root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::logging::event_names;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read target root {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One instance selected for update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: String,
    /// `<root>/<id>/<marker dir>`, where files are installed.
    pub base_path: PathBuf,
    /// `<base_path>/<prefix><id>.exe`; `None` when no usable name can be built.
    pub exe_path: Option<PathBuf>,
}

/// Why an instance directory was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Listed in the exclusion string.
    Excluded,
    /// No sub-directory contains the marker.
    NoMarkerDir,
    /// More than one sub-directory contains the marker.
    AmbiguousMarker { candidates: Vec<String> },
    /// The instance directory could not be listed.
    Unreadable { error: String },
    /// Directory name is not valid UTF-8.
    InvalidName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedInstance {
    pub id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Discovery result: selected instances in ascending id order plus the
/// directories that were passed over.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub instances: BTreeMap<String, Instance>,
    pub skipped: Vec<SkippedInstance>,
}

/// Sub-directory names of `dir`, sorted.
fn child_dirs(dir: &Path) -> std::io::Result<Vec<(PathBuf, Option<String>)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push((path, entry.file_name().to_str().map(str::to_string)));
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn exe_path_for(base: &Path, prefix: &str, id: &str) -> Option<PathBuf> {
    if prefix.contains('/') || prefix.contains(MAIN_SEPARATOR) {
        return None;
    }
    Some(base.join(format!("{}{}.exe", prefix, id)))
}

/// Scan `root` for instance directories.
///
/// A directory is skipped when its name occurs anywhere inside `exclusions`
/// (a substring test, so `"1"` is excluded by `"001,002"`). A kept instance
/// must hold exactly one sub-directory whose name contains `marker`.
pub fn discover_targets(
    root: &Path,
    marker: &str,
    exclusions: &str,
    prefix: &str,
) -> Result<Discovery, DiscoveryError> {
    let entries = child_dirs(root).map_err(|source| DiscoveryError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut discovery = Discovery::default();
    for (path, name) in entries {
        let Some(id) = name else {
            warn!(target: event_names::DISCOVER_UNREADABLE, path = %path.display(), "Skipping non-UTF-8 instance directory");
            discovery.skipped.push(SkippedInstance {
                id: path.display().to_string(),
                reason: SkipReason::InvalidName,
            });
            continue;
        };

        if exclusions.contains(id.as_str()) {
            debug!(target: event_names::DISCOVER_EXCLUDED, instance = %id, "Instance excluded");
            discovery.skipped.push(SkippedInstance {
                id,
                reason: SkipReason::Excluded,
            });
            continue;
        }

        let subdirs = match child_dirs(&path) {
            Ok(subdirs) => subdirs,
            Err(e) => {
                warn!(target: event_names::DISCOVER_UNREADABLE, instance = %id, error = %e, "Cannot read instance directory");
                discovery.skipped.push(SkippedInstance {
                    id,
                    reason: SkipReason::Unreadable {
                        error: e.to_string(),
                    },
                });
                continue;
            }
        };

        let mut matches: Vec<(PathBuf, String)> = subdirs
            .into_iter()
            .filter_map(|(p, n)| n.filter(|n| n.contains(marker)).map(|n| (p, n)))
            .collect();

        if matches.len() != 1 {
            let candidates: Vec<String> = matches.into_iter().map(|(_, n)| n).collect();
            warn!(
                target: event_names::DISCOVER_AMBIGUOUS,
                instance = %id,
                marker,
                found = candidates.len(),
                "Instance needs exactly one sub-directory matching the server type"
            );
            let reason = if candidates.is_empty() {
                SkipReason::NoMarkerDir
            } else {
                SkipReason::AmbiguousMarker { candidates }
            };
            discovery.skipped.push(SkippedInstance { id, reason });
            continue;
        }

        let (base_path, _) = matches.remove(0);
        let exe_path = exe_path_for(&base_path, prefix, &id);
        info!(target: event_names::DISCOVER_INSTANCE, instance = %id, path = %base_path.display(), "Found instance");
        discovery.instances.insert(
            id.clone(),
            Instance {
                id,
                base_path,
                exe_path,
            },
        );
    }

    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mkdirs(root: &Path, dirs: &[&str]) {
        for d in dirs {
            fs::create_dir_all(root.join(d)).unwrap();
        }
    }

    #[test]
    fn test_single_marker_dir_selected() {
        let temp = TempDir::new().unwrap();
        mkdirs(temp.path(), &["007/trade4", "007/logs"]);

        let found = discover_targets(temp.path(), "trade", "", "trade").unwrap();
        let inst = &found.instances["007"];
        assert_eq!(inst.base_path, temp.path().join("007").join("trade4"));
        assert_eq!(
            inst.exe_path.as_deref(),
            Some(temp.path().join("007/trade4/trade007.exe").as_path())
        );
        assert!(found.skipped.is_empty());
    }

    #[test]
    fn test_zero_or_many_markers_skip_instance() {
        let temp = TempDir::new().unwrap();
        mkdirs(
            temp.path(),
            &["001/logs", "002/trade4", "002/trade5", "003/trade"],
        );

        let found = discover_targets(temp.path(), "trade", "", "trade").unwrap();
        assert_eq!(found.instances.keys().collect::<Vec<_>>(), vec!["003"]);
        assert_eq!(found.skipped.len(), 2);
        assert_eq!(found.skipped[0].reason, SkipReason::NoMarkerDir);
        assert_eq!(
            found.skipped[1].reason,
            SkipReason::AmbiguousMarker {
                candidates: vec!["trade4".to_string(), "trade5".to_string()]
            }
        );
    }

    #[test]
    fn test_exclusion_is_substring_match() {
        let temp = TempDir::new().unwrap();
        mkdirs(temp.path(), &["1/trade", "01/trade", "003/trade"]);

        let found = discover_targets(temp.path(), "trade", "001,002", "trade").unwrap();
        // "1" and "01" both occur inside "001,002".
        assert_eq!(found.instances.keys().collect::<Vec<_>>(), vec!["003"]);
        assert!(found
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::Excluded));
    }

    #[test]
    fn test_files_are_not_instances() {
        let temp = TempDir::new().unwrap();
        mkdirs(temp.path(), &["007/trade"]);
        fs::write(temp.path().join("README"), "x").unwrap();
        fs::write(temp.path().join("007").join("trade.txt"), "x").unwrap();

        let found = discover_targets(temp.path(), "trade", "", "trade").unwrap();
        assert_eq!(found.instances.len(), 1);
    }

    #[test]
    fn test_prefix_with_separator_leaves_exe_unresolved() {
        let temp = TempDir::new().unwrap();
        mkdirs(temp.path(), &["007/trade"]);

        let found = discover_targets(temp.path(), "trade", "", "bin/trade").unwrap();
        assert_eq!(found.instances["007"].exe_path, None);
    }

    #[test]
    fn test_unreadable_root_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        assert!(matches!(
            discover_targets(&missing, "trade", "", "trade"),
            Err(DiscoveryError::UnreadableRoot { .. })
        ));
    }
}
