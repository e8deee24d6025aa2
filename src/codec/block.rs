//! Block framing for compressed payloads in the content stream.
//!
//! ```text
//! ┌─────────────────────┬───────────────────────┬──────────────────────┐
//! │ compressed_len: u16 │ decompressed_len: u16 │ payload              │
//! │ (big-endian)        │ (big-endian)          │ [u8; compressed_len] │
//! └─────────────────────┴───────────────────────┴──────────────────────┘
//! ```
//!
//! Blocks whose two lengths match are stored verbatim.

use std::io::{ErrorKind, Read, Write};

use byteorder::{BigEndian, ReadBytesExt};
use tracing::trace;

use crate::codec::lz;
use crate::error::{CacheError, Result};

/// Size of the per-block length prefix.
pub const BLOCK_HEADER_SIZE: u64 = 4;

/// Length prefix of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub compressed_len: u16,
    pub decompressed_len: u16,
}

impl BlockHeader {
    /// Read a block header.
    pub fn read(reader: &mut impl Read) -> std::io::Result<Self> {
        Ok(Self {
            compressed_len: reader.read_u16::<BigEndian>()?,
            decompressed_len: reader.read_u16::<BigEndian>()?,
        })
    }

    /// The payload is stored without LZ coding.
    pub fn is_stored(&self) -> bool {
        self.compressed_len == self.decompressed_len
    }
}

/// Decode framed blocks from `reader` into `writer` until `expected_len`
/// decoded bytes have been produced.
///
/// `offset` is the content-stream position of the first block and is
/// used only for error reporting. Returns the number of bytes written.
/// Failures writing to `writer` come back as [`CacheError::Output`].
pub fn decode_blocks(
    reader: &mut impl Read,
    writer: &mut impl Write,
    expected_len: u64,
    offset: u64,
) -> Result<u64> {
    let mut produced: u64 = 0;
    let mut pos = offset;
    let mut payload: Vec<u8> = Vec::new();

    while produced < expected_len {
        let header = BlockHeader::read(reader).map_err(|e| truncated(e, "block header", pos))?;
        if header.decompressed_len == 0 {
            return Err(CacheError::CorruptBlock {
                offset: pos,
                reason: "block declares zero decoded bytes".into(),
            });
        }
        pos += BLOCK_HEADER_SIZE;

        payload.resize(header.compressed_len as usize, 0);
        reader
            .read_exact(&mut payload)
            .map_err(|e| truncated(e, "block payload", pos))?;

        trace!(
            offset = pos,
            compressed = header.compressed_len,
            decompressed = header.decompressed_len,
            "Block"
        );

        if header.is_stored() {
            writer.write_all(&payload).map_err(CacheError::Output)?;
        } else {
            let decoded = lz::decompress(&payload, header.decompressed_len as usize)?;
            writer.write_all(&decoded).map_err(CacheError::Output)?;
        }

        pos += header.compressed_len as u64;
        produced += header.decompressed_len as u64;
    }

    if produced != expected_len {
        return Err(CacheError::LengthMismatch {
            expected: expected_len,
            actual: produced,
        });
    }
    Ok(produced)
}

fn truncated(e: std::io::Error, what: &'static str, offset: u64) -> CacheError {
    if e.kind() == ErrorKind::UnexpectedEof {
        CacheError::Truncated { what, offset }
    } else {
        e.into()
    }
}
