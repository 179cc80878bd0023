//! Resource directory walk down to the fixed version words.

use super::headers::{field, le_u16, le_u32, read_le};
use super::VersionError;

/// Resource type id of `RT_VERSION`.
pub const RT_VERSION: u32 = 16;
/// High bit of a directory entry offset marks a sub-directory.
const SUBDIRECTORY_MASK: u32 = 0x7FFF_FFFF;
const DIRECTORY_HEADER_LEN: usize = 16;
const DIRECTORY_ENTRY_LEN: usize = 8;
/// Offset of the first entry's offset field inside a directory.
const FIRST_ENTRY_OFFSET_FIELD: usize = DIRECTORY_HEADER_LEN + 4;
/// Offset of the file-version words inside `VS_VERSIONINFO`.
const VERSION_WORDS_OFFSET: usize = 48;

/// Scan the root directory for the `RT_VERSION` entry and return the offset
/// of its name directory.
pub fn find_version_entry(rsrc: &[u8]) -> Result<usize, VersionError> {
    let named = le_u16(rsrc, 12)? as usize;
    let ids = le_u16(rsrc, 14)? as usize;

    for i in 0..named + ids {
        let entry = DIRECTORY_HEADER_LEN + i * DIRECTORY_ENTRY_LEN;
        let type_id = le_u32(rsrc, entry)? & SUBDIRECTORY_MASK;
        if type_id == RT_VERSION {
            let offset = le_u32(rsrc, entry + 4)? & SUBDIRECTORY_MASK;
            return Ok(offset as usize);
        }
    }
    Err(VersionError::NoVersionResource)
}

/// Follow name and language directories (first entry each) to the data entry.
pub fn resolve_data_entry(rsrc: &[u8], name_dir: usize) -> Result<usize, VersionError> {
    let language_dir = le_u32(rsrc, name_dir + FIRST_ENTRY_OFFSET_FIELD)? & SUBDIRECTORY_MASK;
    let data_entry =
        le_u32(rsrc, language_dir as usize + FIRST_ENTRY_OFFSET_FIELD)? & SUBDIRECTORY_MASK;
    Ok(data_entry as usize)
}

/// Translate the data entry's RVA into an offset within the section buffer.
pub fn version_data_offset(
    rsrc: &[u8],
    data_entry: usize,
    section_va: u32,
) -> Result<usize, VersionError> {
    let rva = le_u32(rsrc, data_entry)?;
    rva.checked_sub(section_va)
        .map(|offset| offset as usize)
        .ok_or(VersionError::RvaBeforeSection {
            rva,
            virtual_address: section_va,
        })
}

/// The four raw version words in file order.
pub fn decode_version_words(rsrc: &[u8], data_offset: usize) -> Result<[u16; 4], VersionError> {
    let start = data_offset
        .checked_add(VERSION_WORDS_OFFSET)
        .ok_or(VersionError::OutOfBounds {
            offset: data_offset,
            len: VERSION_WORDS_OFFSET,
            available: rsrc.len(),
        })?;
    let raw = field(rsrc, start, 8)?;
    let mut words = [0u16; 4];
    for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(2)) {
        *word = read_le(chunk) as u16;
    }
    Ok(words)
}

/// Walk a resource section buffer all the way to the version words.
pub fn version_words(rsrc: &[u8], section_va: u32) -> Result<[u16; 4], VersionError> {
    let name_dir = find_version_entry(rsrc)?;
    let data_entry = resolve_data_entry(rsrc, name_dir)?;
    let data_offset = version_data_offset(rsrc, data_entry, section_va)?;
    decode_version_words(rsrc, data_offset)
}
