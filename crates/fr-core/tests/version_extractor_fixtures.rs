//! Version extraction against synthetic PE files on disk.

#![cfg(feature = "test-utils")]

use fr_core::install::verify_installed_version;
use fr_core::pe::{read_file_version, VersionError};
use fr_core::test_utils::PeFixtureBuilder;
use std::fs;
use tempfile::TempDir;

fn write(temp: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = temp.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn words_are_reordered_for_display() {
    let temp = TempDir::new().unwrap();
    let path = write(
        &temp,
        "a.exe",
        &PeFixtureBuilder::new().version_words([1, 2, 3, 4]).build(),
    );
    let version = read_file_version(&path).unwrap();
    assert_eq!(version.words, [1, 2, 3, 4]);
    assert_eq!(version.to_string(), "2.1.4.3");
}

#[test]
fn resource_section_found_after_code_sections() {
    let temp = TempDir::new().unwrap();
    let bytes = PeFixtureBuilder::new()
        .leading_sections(&[".text", ".rdata", ".data", ".reloc"])
        .version_words([2, 10, 17, 3])
        .build();
    let path = write(&temp, "b.exe", &bytes);
    assert_eq!(read_file_version(&path).unwrap().to_string(), "10.2.3.17");
}

#[test]
fn missing_mz_signature() {
    let temp = TempDir::new().unwrap();
    let mut bytes = PeFixtureBuilder::new().build();
    bytes[0] = b'Z';
    let path = write(&temp, "c.exe", &bytes);
    assert!(matches!(
        read_file_version(&path),
        Err(VersionError::MissingDosSignature)
    ));
}

#[test]
fn pe_offset_inside_dos_header() {
    let temp = TempDir::new().unwrap();
    let bytes = PeFixtureBuilder::new().pe_offset(0x20).build();
    let path = write(&temp, "d.exe", &bytes);
    assert!(matches!(
        read_file_version(&path),
        Err(VersionError::InvalidPeOffset(0x20))
    ));
}

#[test]
fn missing_pe_signature() {
    let temp = TempDir::new().unwrap();
    let mut bytes = PeFixtureBuilder::new().build();
    bytes[0x80] = b'X';
    let path = write(&temp, "e.exe", &bytes);
    assert!(matches!(
        read_file_version(&path),
        Err(VersionError::MissingPeSignature)
    ));
}

#[test]
fn no_version_resource() {
    let temp = TempDir::new().unwrap();
    let bytes = PeFixtureBuilder::new().without_version_resource().build();
    let path = write(&temp, "f.exe", &bytes);
    assert!(matches!(
        read_file_version(&path),
        Err(VersionError::NoVersionResource)
    ));
}

#[test]
fn truncated_section_data_is_out_of_bounds() {
    let temp = TempDir::new().unwrap();
    let bytes = PeFixtureBuilder::new().build();
    let path = write(&temp, "g.exe", &bytes[..0x200 + 100]);
    assert!(matches!(
        read_file_version(&path),
        Err(VersionError::OutOfBounds { .. })
    ));
}

#[test]
fn truncated_headers_are_io_errors() {
    let temp = TempDir::new().unwrap();
    let bytes = PeFixtureBuilder::new().build();
    let path = write(&temp, "h.exe", &bytes[..0x100]);
    assert!(matches!(read_file_version(&path), Err(VersionError::Io(_))));
}

#[test]
fn missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
        read_file_version(&temp.path().join("absent.exe")),
        Err(VersionError::Io(_))
    ));
}

#[test]
fn verification_compares_display_form() {
    let temp = TempDir::new().unwrap();
    let path = write(
        &temp,
        "trade007.exe",
        &PeFixtureBuilder::new().version_words([1, 2, 3, 4]).build(),
    );
    assert!(verify_installed_version(&path, "2.1.4.3").passed);
    assert!(!verify_installed_version(&path, "1.2.3.4").passed);
}
