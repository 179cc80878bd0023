//! DOS, COFF and section header decoding.

use super::VersionError;

/// Size of the DOS header read up front.
pub const DOS_HEADER_LEN: usize = 64;
/// Offset of `e_lfanew` inside the DOS header.
const PE_OFFSET_FIELD: usize = 60;
/// Signature plus COFF file header.
pub const COFF_HEADER_LEN: usize = 24;
pub const SECTION_HEADER_LEN: usize = 40;
/// Intel 386, the only machine type the fleet ships.
pub const MACHINE_I386: u16 = 0x14c;

const RESOURCE_SECTION_NAME: &[u8] = b".rsrc";

/// Decode a little-endian unsigned integer from up to eight bytes.
pub fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Bounds-checked slice of `len` bytes at `offset`.
pub fn field(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], VersionError> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(VersionError::OutOfBounds {
            offset,
            len,
            available: buf.len(),
        })
}

pub fn le_u16(buf: &[u8], offset: usize) -> Result<u16, VersionError> {
    field(buf, offset, 2).map(|b| read_le(b) as u16)
}

pub fn le_u32(buf: &[u8], offset: usize) -> Result<u32, VersionError> {
    field(buf, offset, 4).map(|b| read_le(b) as u32)
}

/// Validate the DOS header and return the file offset of the PE header.
pub fn pe_header_offset(dos: &[u8]) -> Result<u64, VersionError> {
    if field(dos, 0, 2)? != b"MZ" {
        return Err(VersionError::MissingDosSignature);
    }
    let offset = le_u32(dos, PE_OFFSET_FIELD)?;
    if (offset as usize) < DOS_HEADER_LEN {
        return Err(VersionError::InvalidPeOffset(offset));
    }
    Ok(u64::from(offset))
}

/// The COFF fields the extractor needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoffHeader {
    pub machine: u16,
    pub section_count: u16,
    pub optional_header_size: u16,
}

pub fn parse_coff_header(buf: &[u8]) -> Result<CoffHeader, VersionError> {
    if field(buf, 0, 2)? != b"PE" {
        return Err(VersionError::MissingPeSignature);
    }
    Ok(CoffHeader {
        machine: le_u16(buf, 4)?,
        section_count: le_u16(buf, 6)?,
        optional_header_size: le_u16(buf, 20)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub virtual_address: u32,
    pub raw_size: u32,
    pub raw_offset: u32,
}

/// Decode a 40-byte section header, returning `None` unless it names the
/// resource section.
pub fn parse_resource_section(buf: &[u8]) -> Result<Option<SectionHeader>, VersionError> {
    if field(buf, 0, RESOURCE_SECTION_NAME.len())? != RESOURCE_SECTION_NAME {
        return Ok(None);
    }
    Ok(Some(SectionHeader {
        virtual_address: le_u32(buf, 12)?,
        raw_size: le_u32(buf, 16)?,
        raw_offset: le_u32(buf, 20)?,
    }))
}
