//! Moving outgoing files aside under dated, collision-free backup names.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

/// Split a file name at its last dot: `("core", ".dll")`.
///
/// Names without a dot keep the whole name as stem and an empty suffix.
pub fn split_file_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Builds backup names of the form `<stem>(<signer><YYYYMMDD>_<seq>)<suffix>`.
#[derive(Debug, Clone)]
pub struct BackupNamer {
    signer: String,
    date_stamp: String,
}

impl BackupNamer {
    pub fn new(signer: &str, date: NaiveDate) -> Self {
        Self {
            signer: signer.to_string(),
            date_stamp: date.format("%Y%m%d").to_string(),
        }
    }

    /// Namer stamped with the local date.
    pub fn today(signer: &str) -> Self {
        Self::new(signer, Local::now().date_naive())
    }

    pub fn name_for(&self, stem: &str, suffix: &str, seq: u64) -> String {
        format!(
            "{}({}{}_{}){}",
            stem, self.signer, self.date_stamp, seq, suffix
        )
    }

    /// First unoccupied backup path in `dir`, counting from sequence 0.
    pub fn free_path(&self, dir: &Path, stem: &str, suffix: &str) -> PathBuf {
        self.free_path_from(dir, stem, suffix, 0)
    }

    /// First unoccupied backup path in `dir` at or after sequence `start`.
    pub fn free_path_from(&self, dir: &Path, stem: &str, suffix: &str, start: u64) -> PathBuf {
        let mut seq = start;
        loop {
            let candidate = dir.join(self.name_for(stem, suffix, seq));
            if !occupied(&candidate) {
                return candidate;
            }
            seq = seq.wrapping_add(1);
        }
    }

    /// Rename `path` to a free backup name beside it.
    ///
    /// Returns `Ok(None)` when there is nothing to move.
    pub fn move_aside(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        if !occupied(path) {
            return Ok(None);
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unusable file name: {}", path.display()),
                )
            })?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let (stem, suffix) = split_file_name(name);
        let target = self.free_path(dir, stem, suffix);
        fs::rename(path, &target)?;
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn namer() -> BackupNamer {
        BackupNamer::new("ops", NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(split_file_name("trade007.exe"), ("trade007", ".exe"));
        assert_eq!(split_file_name("lib.tar.gz"), ("lib.tar", ".gz"));
        assert_eq!(split_file_name("LICENSE"), ("LICENSE", ""));
    }

    #[test]
    fn test_name_format() {
        assert_eq!(
            namer().name_for("trade007", ".exe", 0),
            "trade007(ops20240309_0).exe"
        );
    }

    #[test]
    fn test_free_path_skips_taken_sequences() {
        let temp = TempDir::new().unwrap();
        let n = namer();
        fs::write(temp.path().join("app(ops20240309_0).dat"), "").unwrap();
        fs::write(temp.path().join("app(ops20240309_1).dat"), "").unwrap();

        let path = n.free_path(temp.path(), "app", ".dat");
        assert_eq!(path, temp.path().join("app(ops20240309_2).dat"));
    }

    #[test]
    fn test_move_aside() {
        let temp = TempDir::new().unwrap();
        let n = namer();
        let live = temp.path().join("trade007.exe");
        fs::write(&live, "old").unwrap();

        let moved = n.move_aside(&live).unwrap().unwrap();
        assert!(!live.exists());
        assert_eq!(moved, temp.path().join("trade007(ops20240309_0).exe"));
        assert_eq!(fs::read_to_string(&moved).unwrap(), "old");

        assert_eq!(n.move_aside(&live).unwrap(), None);
    }

    #[test]
    fn test_move_aside_without_extension() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("VERSION");
        fs::write(&live, "1").unwrap();

        let moved = namer().move_aside(&live).unwrap().unwrap();
        assert_eq!(moved, temp.path().join("VERSION(ops20240309_0)"));
    }
}
