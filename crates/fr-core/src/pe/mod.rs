//! Embedded file-version extraction from PE executables.
//!
//! Reads just enough of a Windows executable to reach its `RT_VERSION`
//! resource: DOS header, COFF header, section table, then the resource
//! directory tree inside `.rsrc`. No platform API is involved, so the
//! extractor runs the same on every host.
//!
//! All header decoding works on byte slices with bounds-checked accessors;
//! malformed input yields a [`VersionError`], never a panic.

pub mod headers;
pub mod resource;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use headers::{
    parse_coff_header, parse_resource_section, pe_header_offset, COFF_HEADER_LEN,
    DOS_HEADER_LEN, MACHINE_I386, SECTION_HEADER_LEN,
};

/// Structural failures while reading an embedded version.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing MZ signature")]
    MissingDosSignature,

    #[error("PE header offset {0} points inside the DOS header")]
    InvalidPeOffset(u32),

    #[error("missing PE signature")]
    MissingPeSignature,

    #[error("no .rsrc section")]
    NoResourceSection,

    #[error("no version resource")]
    NoVersionResource,

    #[error("read of {len} bytes at offset {offset} exceeds {available} available")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("data RVA {rva:#x} precedes section virtual address {virtual_address:#x}")]
    RvaBeforeSection { rva: u32, virtual_address: u32 },
}

/// The four version words as stored in `VS_FIXEDFILEINFO`.
///
/// Displayed as `"{w1}.{w0}.{w3}.{w2}"`, i.e. major.minor.build.revision for
/// the usual little-endian layout of `dwFileVersionMS` / `dwFileVersionLS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersion {
    pub words: [u16; 4],
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [w0, w1, w2, w3] = self.words;
        write!(f, "{}.{}.{}.{}", w1, w0, w3, w2)
    }
}

/// Extract the embedded version from any seekable byte source.
pub fn extract_version<R: Read + Seek>(reader: &mut R) -> Result<FileVersion, VersionError> {
    let mut dos = [0u8; DOS_HEADER_LEN];
    reader.read_exact(&mut dos)?;
    let pe_offset = pe_header_offset(&dos)?;

    reader.seek(SeekFrom::Start(pe_offset))?;
    let mut coff_buf = [0u8; COFF_HEADER_LEN];
    reader.read_exact(&mut coff_buf)?;
    let coff = parse_coff_header(&coff_buf)?;
    if coff.machine != MACHINE_I386 {
        debug!(machine = coff.machine, "Unexpected PE machine type");
    }

    reader.seek(SeekFrom::Current(i64::from(coff.optional_header_size)))?;
    let mut section = None;
    let mut header = [0u8; SECTION_HEADER_LEN];
    for _ in 0..coff.section_count {
        reader.read_exact(&mut header)?;
        if let Some(found) = parse_resource_section(&header)? {
            section = Some(found);
            break;
        }
    }
    let section = section.ok_or(VersionError::NoResourceSection)?;

    reader.seek(SeekFrom::Start(u64::from(section.raw_offset)))?;
    let mut rsrc = Vec::new();
    reader
        .by_ref()
        .take(u64::from(section.raw_size))
        .read_to_end(&mut rsrc)?;

    let words = resource::version_words(&rsrc, section.virtual_address)?;
    Ok(FileVersion { words })
}

/// Read the embedded version of the file at `path`.
pub fn read_file_version(path: &Path) -> Result<FileVersion, VersionError> {
    let mut reader = BufReader::new(File::open(path)?);
    extract_version(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::PeFixtureBuilder;
    use std::io::Cursor;

    #[test]
    fn test_display_order() {
        let v = FileVersion { words: [1, 2, 3, 4] };
        assert_eq!(v.to_string(), "2.1.4.3");
    }

    #[test]
    fn test_extract_from_fixture() {
        let bytes = PeFixtureBuilder::new().version_words([1, 2, 3, 4]).build();
        let version = extract_version(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(version.to_string(), "2.1.4.3");
    }

    #[test]
    fn test_rsrc_after_other_sections() {
        let bytes = PeFixtureBuilder::new()
            .leading_sections(&[".text", ".data"])
            .version_words([0, 5, 7, 1])
            .build();
        let version = extract_version(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(version.to_string(), "5.0.1.7");
    }

    #[test]
    fn test_foreign_machine_is_not_fatal() {
        let bytes = PeFixtureBuilder::new()
            .machine(0x8664)
            .version_words([3, 9, 0, 0])
            .build();
        assert_eq!(
            extract_version(&mut Cursor::new(bytes)).unwrap().to_string(),
            "9.3.0.0"
        );
    }

    #[test]
    fn test_missing_rsrc() {
        let bytes = PeFixtureBuilder::new().without_resource_section().build();
        assert!(matches!(
            extract_version(&mut Cursor::new(bytes)),
            Err(VersionError::NoResourceSection)
        ));
    }

    #[test]
    fn test_short_file_is_io_error() {
        let bytes = b"MZ".to_vec();
        assert!(matches!(
            extract_version(&mut Cursor::new(bytes)),
            Err(VersionError::Io(_))
        ));
    }
}
