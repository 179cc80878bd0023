//! Backup retention: keep the newest `N` files of a category per directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::warn;

use crate::discover::matches_suffix;

/// A deletion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneFailure {
    pub path: PathBuf,
    pub error: String,
}

/// What a retention pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneOutcome {
    pub deleted: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<PruneFailure>,
}

/// Oldest entries beyond `keep`, ordered by modification time then path.
pub fn select_excess(mut entries: Vec<BackupEntry>, keep: usize) -> Vec<BackupEntry> {
    if entries.len() <= keep {
        return Vec::new();
    }
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    entries.truncate(entries.len() - keep);
    entries
}

/// Files directly in `dir` matching `suffixes`, minus `protected` names.
///
/// An unreadable modification time counts as "now", keeping the file.
pub fn list_candidates(
    dir: &Path,
    protected: &[&str],
    suffixes: &[String],
) -> std::io::Result<Vec<BackupEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if protected.contains(&name.as_str()) || !matches_suffix(&name, suffixes) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        entries.push(BackupEntry { path, modified });
    }
    Ok(entries)
}

/// Delete the oldest matching files in `dir` so at most `keep` remain.
///
/// An unreadable directory is a no-op. A failed delete is recorded and the
/// remaining deletions still run.
pub fn prune_backups(
    dir: &Path,
    protected: &[&str],
    suffixes: &[String],
    keep: usize,
) -> PruneOutcome {
    let mut outcome = PruneOutcome::default();
    let candidates = match list_candidates(dir, protected, suffixes) {
        Ok(c) => c,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list backups");
            return outcome;
        }
    };

    for entry in select_excess(candidates, keep) {
        match fs::remove_file(&entry.path) {
            Ok(()) => outcome.deleted.push(entry.path),
            Err(e) => outcome.failed.push(PruneFailure {
                path: entry.path,
                error: e.to_string(),
            }),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn at(secs: u64, path: &str) -> BackupEntry {
        BackupEntry {
            path: PathBuf::from(path),
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_select_excess_oldest_first() {
        let entries = vec![at(30, "c"), at(10, "a"), at(20, "b"), at(40, "d")];
        let excess = select_excess(entries, 2);
        let paths: Vec<_> = excess.iter().map(|e| e.path.to_str().unwrap()).collect();
        assert_eq!(paths, vec!["a", "b"]);
    }

    #[test]
    fn test_select_excess_ties_by_path() {
        let entries = vec![at(10, "z"), at(10, "m"), at(10, "a")];
        let excess = select_excess(entries, 1);
        let paths: Vec<_> = excess.iter().map(|e| e.path.to_str().unwrap()).collect();
        assert_eq!(paths, vec!["a", "m"]);
    }

    #[test]
    fn test_select_excess_within_limit() {
        assert!(select_excess(vec![at(1, "a"), at(2, "b")], 2).is_empty());
        assert!(select_excess(Vec::new(), 0).is_empty());
    }

    #[test]
    fn test_prune_protects_named_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        for (i, name) in ["a(x_0).exe", "a(x_1).exe", "a(x_2).exe", "trade007.exe"]
            .iter()
            .enumerate()
        {
            let p = dir.join(name);
            fs::write(&p, "x").unwrap();
            let t = filetime::FileTime::from_unix_time(1_000 + i as i64, 0);
            filetime::set_file_mtime(&p, t).unwrap();
        }
        fs::write(dir.join("keep.dat"), "x").unwrap();

        let outcome = prune_backups(dir, &["trade007.exe"], &[".exe".to_string()], 1);
        assert_eq!(
            outcome.deleted,
            vec![dir.join("a(x_0).exe"), dir.join("a(x_1).exe")]
        );
        assert!(dir.join("trade007.exe").exists());
        assert!(dir.join("a(x_2).exe").exists());
        assert!(dir.join("keep.dat").exists());
    }

    #[test]
    fn test_prune_unreadable_dir_is_noop() {
        let temp = TempDir::new().unwrap();
        let outcome = prune_backups(&temp.path().join("gone"), &[], &[".exe".to_string()], 0);
        assert_eq!(outcome, PruneOutcome::default());
    }
}
