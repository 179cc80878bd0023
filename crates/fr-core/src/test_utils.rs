//! Test utilities for fr-core.
//!
//! This module provides test infrastructure including:
//! - A synthetic PE builder with a controllable version resource
//! - A ready-made `UpdateConfig` for scratch directories
//! - Staging helpers for instance trees

use std::fs;
use std::io;
use std::path::Path;

use fr_config::{ServiceSettings, StopPolicy, UpdateConfig};

pub use crate::mock_service::MockServiceController;

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

// ============================================================================
// Synthetic PE files
// ============================================================================

const OPTIONAL_HEADER_LEN: usize = 224;
const FILE_ALIGNMENT: usize = 0x200;
const RESOURCE_VA: u32 = 0x3000;

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// A minimal `.rsrc` section holding a single version resource.
///
/// Layout: root directory (1 entry of `type_id`) at 0, name directory at
/// 24, language directory at 48, data entry at 72, `VS_VERSIONINFO` at 88
/// with the four file-version words at 136.
pub fn version_resource(section_va: u32, type_id: u32, words: [u16; 4]) -> Vec<u8> {
    let mut buf = vec![0u8; 180];
    // root → name directory
    put_u16(&mut buf, 14, 1);
    put_u32(&mut buf, 16, type_id);
    put_u32(&mut buf, 20, 0x8000_0000 | 24);
    // name → language directory
    put_u16(&mut buf, 38, 1);
    put_u32(&mut buf, 40, 1);
    put_u32(&mut buf, 44, 0x8000_0000 | 48);
    // language → data entry
    put_u16(&mut buf, 62, 1);
    put_u32(&mut buf, 64, 0x409);
    put_u32(&mut buf, 68, 72);
    // data entry: RVA, size
    put_u32(&mut buf, 72, section_va + 88);
    put_u32(&mut buf, 76, 92);
    // VS_VERSIONINFO header and key
    put_u16(&mut buf, 88, 92);
    put_u16(&mut buf, 90, 52);
    for (i, unit) in "VS_VERSION_INFO".encode_utf16().enumerate() {
        put_u16(&mut buf, 94 + i * 2, unit);
    }
    // VS_FIXEDFILEINFO
    put_u32(&mut buf, 128, 0xFEEF_04BD);
    put_u32(&mut buf, 132, 0x0001_0000);
    for (i, w) in words.iter().enumerate() {
        put_u16(&mut buf, 136 + i * 2, *w);
    }
    buf
}

/// Builder for PE images that carry a version resource.
#[derive(Debug, Clone)]
pub struct PeFixtureBuilder {
    words: [u16; 4],
    machine: u16,
    pe_offset: u32,
    leading_sections: Vec<String>,
    resource_section: bool,
    resource_type: u32,
}

impl Default for PeFixtureBuilder {
    fn default() -> Self {
        Self {
            words: [0, 1, 1, 0],
            machine: 0x14c,
            pe_offset: 0x80,
            leading_sections: Vec::new(),
            resource_section: true,
            resource_type: 16,
        }
    }
}

impl PeFixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `VS_FIXEDFILEINFO` words; `[a, b, c, d]` reads as `b.a.d.c`.
    pub fn version_words(mut self, words: [u16; 4]) -> Self {
        self.words = words;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn pe_offset(mut self, offset: u32) -> Self {
        self.pe_offset = offset;
        self
    }

    /// Section headers placed before `.rsrc`.
    pub fn leading_sections(mut self, names: &[&str]) -> Self {
        self.leading_sections = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn without_resource_section(mut self) -> Self {
        self.resource_section = false;
        self
    }

    /// Replace the version resource with an icon resource.
    pub fn without_version_resource(mut self) -> Self {
        self.resource_type = 3;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let pe_offset = self.pe_offset as usize;
        let section_count = self.leading_sections.len() + usize::from(self.resource_section);
        let table = pe_offset + 24 + OPTIONAL_HEADER_LEN;
        let headers_end = table + 40 * section_count;
        let raw_offset = headers_end.div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT;
        let rsrc = version_resource(RESOURCE_VA, self.resource_type, self.words);

        let len = if self.resource_section {
            raw_offset + rsrc.len()
        } else {
            headers_end
        };
        let mut buf = vec![0u8; len.max(64)];

        buf[pe_offset..pe_offset + 4].copy_from_slice(b"PE\0\0");
        put_u16(&mut buf, pe_offset + 4, self.machine);
        put_u16(&mut buf, pe_offset + 6, section_count as u16);
        put_u16(&mut buf, pe_offset + 20, OPTIONAL_HEADER_LEN as u16);

        for (i, name) in self.leading_sections.iter().enumerate() {
            let at = table + i * 40;
            let bytes = name.as_bytes();
            let n = bytes.len().min(8);
            buf[at..at + n].copy_from_slice(&bytes[..n]);
        }
        if self.resource_section {
            let at = table + self.leading_sections.len() * 40;
            buf[at..at + 5].copy_from_slice(b".rsrc");
            put_u32(&mut buf, at + 12, RESOURCE_VA);
            put_u32(&mut buf, at + 16, rsrc.len() as u32);
            put_u32(&mut buf, at + 20, raw_offset as u32);
            buf[raw_offset..raw_offset + rsrc.len()].copy_from_slice(&rsrc);
        }

        // DOS header last so a small pe_offset cannot clobber it.
        buf[0..2].copy_from_slice(b"MZ");
        put_u32(&mut buf, 60, self.pe_offset);
        buf
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.build())
    }
}

// ============================================================================
// Config and directory helpers
// ============================================================================

/// Config for a `trade` fleet: prefix `trade`, main executable `app.exe`,
/// target version `1.0.0.1`, signer `ops`, retention 3, continue policy.
pub fn update_config(source_dir: &Path, target_dir: &Path) -> UpdateConfig {
    UpdateConfig {
        author: "ops".to_string(),
        exe_version: "1.0.0.1".to_string(),
        source_dir: source_dir.to_path_buf(),
        source_exe_name: "app.exe".to_string(),
        source_suffixes: vec![".exe".to_string(), ".dat".to_string()],
        target_dir: target_dir.to_path_buf(),
        server_type: "trade".to_string(),
        server_prefix: "trade".to_string(),
        excluded_ids: String::new(),
        backup_retention: fr_config::DEFAULT_BACKUP_RETENTION,
        stop_policy: StopPolicy::Continue,
        service: ServiceSettings::default(),
    }
}

/// Create `<root>/<id>/<marker>` and return it.
pub fn make_instance_dir(root: &Path, id: &str, marker: &str) -> io::Result<std::path::PathBuf> {
    let dir = root.join(id).join(marker);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
