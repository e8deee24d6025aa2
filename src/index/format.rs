//! Metadata stream (`.toc`) binary format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (8 bytes, little-endian)      │
//! │  magic: u32 = 0x1867C64E             │
//! │  version: i32 (16 or 20)             │
//! ├──────────────────────────────────────┤
//! │ RECORDS (96 bytes each, until EOF)   │
//! │  offset: i64          (-1 = dir)     │
//! │  mod_time: i64        (-1 = unknown) │
//! │  compressed_length: i32              │
//! │  length: i32                         │
//! │  scope_index: i32                    │
//! │  parent_directory_index: i32         │
//! │  name: [u8; 64]       (NUL padded)   │
//! └──────────────────────────────────────┘
//! ```
//!
//! There is no record count; the number of records follows from the
//! stream length.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CacheError, Result};
use crate::model::entry::CacheEntry;

/// Magic number at the start of every metadata stream.
pub const MAGIC: u32 = 0x1867_C64E;

/// Header versions this reader accepts.
pub const SUPPORTED_VERSIONS: [i32; 2] = [16, 20];

/// Header size in bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of the leading magic field.
pub const MAGIC_SIZE: usize = 4;

/// Width of the name slot in a record.
pub const NAME_LEN: usize = 64;

/// Fixed record size in bytes.
pub const RECORD_SIZE: usize = 8 + 8 + 4 + 4 + 4 + 4 + NAME_LEN;

/// Decoded metadata stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocHeader {
    pub magic: u32,
    pub version: i32,
}

impl TocHeader {
    /// Decode the header bytes without validating them.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: LittleEndian::read_u32(&buf[0..4]),
            version: LittleEndian::read_i32(&buf[4..8]),
        }
    }

    /// Check the magic first, then the version.
    pub fn validate(&self) -> Result<()> {
        check_magic(self.magic)?;
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(CacheError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Reject a stream that does not start with [`MAGIC`].
pub fn check_magic(magic: u32) -> Result<()> {
    if magic != MAGIC {
        return Err(CacheError::InvalidMagic { found: magic });
    }
    Ok(())
}

/// Decode one record.
pub fn decode_record(buf: &[u8; RECORD_SIZE]) -> CacheEntry {
    CacheEntry {
        offset: LittleEndian::read_i64(&buf[0..8]),
        mod_time: LittleEndian::read_i64(&buf[8..16]),
        compressed_length: LittleEndian::read_i32(&buf[16..20]),
        length: LittleEndian::read_i32(&buf[20..24]),
        scope_index: LittleEndian::read_i32(&buf[24..28]),
        parent_directory_index: LittleEndian::read_i32(&buf[28..32]),
        file_name: decode_name(&buf[32..32 + NAME_LEN]),
    }
}

/// Names are one byte per character; trailing NULs are padding.
pub fn decode_name(slot: &[u8]) -> String {
    let end = slot.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    slot[..end].iter().map(|&b| b as char).collect()
}
