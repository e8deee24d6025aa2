//! Content stream store: reads file payloads by offset.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::block;
use crate::error::{CacheError, Result};
use crate::model::entry::CacheEntry;

/// Default read buffer for the content stream.
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

/// Chunk size for copying stored payloads.
const COPY_CHUNK: usize = 8 * 1024;

/// Exclusive, seekable handle on a content stream (`.cache`).
///
/// Every read repositions the single underlying handle, so a store must
/// not be shared between threads; give each worker its own store.
pub struct ContentStore<R = BufReader<File>> {
    path: PathBuf,
    reader: R,
}

impl ContentStore {
    /// Open a content stream for random-access reading.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CacheError::FileNotFound(path.clone())
            } else {
                CacheError::io(&path, e)
            }
        })?;
        Ok(Self {
            reader: BufReader::with_capacity(buffer_size.max(1), file),
            path,
        })
    }
}

impl<R: Read + Seek> ContentStore<R> {
    /// Wrap an already open stream; `path` is used for error messages.
    pub fn from_reader(path: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            path: path.into(),
            reader,
        }
    }

    /// Decode the payload of `entry` into `writer`.
    ///
    /// Payloads whose stored and decoded lengths match are copied as is;
    /// everything else is read as framed blocks. Returns the number of
    /// bytes written, always equal to the entry's declared length.
    ///
    /// Read failures are tagged with this store's path. Failures writing
    /// to `writer` are returned as [`CacheError::Output`] for the caller
    /// to attribute.
    pub fn copy_entry(&mut self, entry: &CacheEntry, writer: &mut impl Write) -> Result<u64> {
        let (offset, length) = payload_span(entry)?;
        debug!(
            offset,
            length,
            compressed = entry.compressed_length,
            name = %entry.file_name,
            "Reading payload"
        );
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| CacheError::io(&self.path, e))?;

        if entry.is_stored_raw() {
            let copied = self.copy_raw(length, writer)?;
            if copied != length {
                return Err(CacheError::LengthMismatch {
                    expected: length,
                    actual: copied,
                });
            }
            Ok(copied)
        } else {
            block::decode_blocks(&mut self.reader, writer, length, offset).map_err(|e| match e {
                CacheError::Io { source, .. } => CacheError::io(&self.path, source),
                other => other,
            })
        }
    }

    /// Copy up to `length` bytes from the current position. Read failures
    /// carry the stream path; write failures are [`CacheError::Output`].
    fn copy_raw(&mut self, length: u64, writer: &mut impl Write) -> Result<u64> {
        let mut source = (&mut self.reader).take(length);
        let mut buf = [0u8; COPY_CHUNK];
        let mut copied = 0u64;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CacheError::io(&self.path, e)),
            };
            writer.write_all(&buf[..n]).map_err(CacheError::Output)?;
            copied += n as u64;
        }
        Ok(copied)
    }

    /// Decode the payload of `entry` into memory.
    pub fn read_entry(&mut self, entry: &CacheEntry) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(entry.length.max(0) as usize);
        self.copy_entry(entry, &mut buf)?;
        Ok(buf)
    }
}

/// Validated content-stream offset and decoded length of a file entry.
fn payload_span(entry: &CacheEntry) -> Result<(u64, u64)> {
    let invalid = |reason: &str| CacheError::InvalidEntry {
        name: entry.file_name.clone(),
        reason: reason.to_string(),
    };
    if entry.is_directory() {
        return Err(invalid("directories have no payload"));
    }
    let offset = u64::try_from(entry.offset).map_err(|_| invalid("negative offset"))?;
    let length = u64::try_from(entry.length).map_err(|_| invalid("negative length"))?;
    if entry.compressed_length < 0 {
        return Err(invalid("negative compressed length"));
    }
    Ok((offset, length))
}
