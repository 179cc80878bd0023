//! Staged source file resolution.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::logging::event_names;

/// Whether `name` ends with any of `suffixes`. Empty suffixes never match.
pub fn matches_suffix(name: &str, suffixes: &[String]) -> bool {
    suffixes
        .iter()
        .any(|s| !s.is_empty() && name.ends_with(s.as_str()))
}

/// Files to ship, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSet {
    files: BTreeMap<String, PathBuf>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; a later file with the same name replaces the earlier one.
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Option<PathBuf> {
        self.files.insert(name.into(), path.into())
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.files.iter().map(|(n, p)| (n.as_str(), p.as_path()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path()));
    }
    entries.sort();
    Ok(entries)
}

fn collect(dir: &Path, suffixes: &[String], recursive: bool, set: &mut SourceSet) -> std::io::Result<()> {
    for (name, path) in sorted_entries(dir)? {
        if path.is_dir() {
            if recursive {
                if let Err(e) = collect(&path, suffixes, recursive, set) {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable source sub-directory");
                }
            }
            continue;
        }
        if !matches_suffix(&name, suffixes) {
            continue;
        }
        debug!(target: event_names::RESOLVE_SOURCE, file = %name, path = %path.display(), "Source file");
        if let Some(previous) = set.insert(name.clone(), path.clone()) {
            warn!(
                target: event_names::RESOLVE_DUPLICATE,
                file = %name,
                kept = %path.display(),
                dropped = %previous.display(),
                "Duplicate source file name"
            );
        }
    }
    Ok(())
}

/// Collect files under `dir` whose names end with one of `suffixes`.
///
/// Entries are visited in name order so duplicate resolution is stable. An
/// unreadable `dir` yields an empty set.
pub fn resolve_sources(dir: &Path, suffixes: &[String], recursive: bool) -> SourceSet {
    let mut set = SourceSet::new();
    if suffixes.iter().all(String::is_empty) {
        return set;
    }
    if let Err(e) = collect(dir, suffixes, recursive, &mut set) {
        error!(path = %dir.display(), error = %e, "Cannot read source directory");
        return SourceSet::new();
    }
    set
}
