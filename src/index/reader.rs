//! Metadata stream parsing and directory path resolution.

use std::io::{ErrorKind, Read};

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::index::format::{self, TocHeader, HEADER_SIZE, MAGIC_SIZE, RECORD_SIZE};
use crate::model::entry::CacheEntry;

/// Parsed metadata stream: file and directory tables plus the resolved
/// path of every directory.
///
/// Directory index 0 is the implicit root (empty path, no record). Each
/// directory record read from the stream takes the next index, so a
/// directory's path is known before any of its children is read.
#[derive(Debug, Clone)]
pub struct CacheDirectory {
    version: i32,
    files: Vec<CacheEntry>,
    directories: Vec<CacheEntry>,
    dir_paths: Vec<String>,
}

impl CacheDirectory {
    /// Parse a metadata stream positioned at its first byte.
    ///
    /// Reads the header, then records until the stream is exhausted.
    /// Fails on a bad header, a record cut short, or a record whose
    /// parent directory has not been seen yet.
    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        // Magic is validated before the version is read.
        let mut header_buf = [0u8; HEADER_SIZE];
        if read_up_to(&mut reader, &mut header_buf[..MAGIC_SIZE])? < MAGIC_SIZE {
            return Err(CacheError::Truncated {
                what: "header",
                offset: 0,
            });
        }
        format::check_magic(LittleEndian::read_u32(&header_buf[..MAGIC_SIZE]))?;
        if read_up_to(&mut reader, &mut header_buf[MAGIC_SIZE..])? < HEADER_SIZE - MAGIC_SIZE {
            return Err(CacheError::Truncated {
                what: "header",
                offset: MAGIC_SIZE as u64,
            });
        }
        let header = TocHeader::decode(&header_buf);
        header.validate()?;

        let mut dir = Self {
            version: header.version,
            files: Vec::new(),
            directories: Vec::new(),
            dir_paths: vec![String::new()],
        };

        let mut record = [0u8; RECORD_SIZE];
        let mut offset = HEADER_SIZE as u64;
        loop {
            let got = read_up_to(&mut reader, &mut record)?;
            if got == 0 {
                break;
            }
            if got < RECORD_SIZE {
                return Err(CacheError::Truncated {
                    what: "record",
                    offset,
                });
            }
            dir.push(format::decode_record(&record))?;
            offset += RECORD_SIZE as u64;
        }

        info!(
            version = dir.version,
            files = dir.files.len(),
            directories = dir.directories.len(),
            "Read cache directory"
        );
        Ok(dir)
    }

    /// Parse an in-memory metadata stream.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from(data)
    }

    fn push(&mut self, entry: CacheEntry) -> Result<()> {
        let parent = self.dir_path(entry.parent_directory_index).ok_or_else(|| {
            CacheError::UnresolvedParent {
                name: entry.file_name.clone(),
                parent: entry.parent_directory_index,
            }
        })?;

        if entry.is_directory() {
            let path = join_path(parent, &entry.file_name);
            debug!(index = self.dir_paths.len(), path = %path, "Directory");
            self.dir_paths.push(path);
            self.directories.push(entry);
        } else {
            if entry.has_scope_anomaly() {
                warn!(
                    name = %entry.file_name,
                    scope = %format!("0x{:08x}", entry.scope_index),
                    "File has non-zero scope index"
                );
            }
            self.files.push(entry);
        }
        Ok(())
    }

    /// Header version of the parsed stream.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// File records in stream order.
    pub fn files(&self) -> &[CacheEntry] {
        &self.files
    }

    /// Directory records in stream order. Directory index `i` (i >= 1)
    /// is `directories()[i - 1]`.
    pub fn directories(&self) -> &[CacheEntry] {
        &self.directories
    }

    /// Resolved relative path of a directory index; `""` for the root.
    pub fn dir_path(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.dir_paths.get(i))
            .map(String::as_str)
    }

    /// Resolved relative path of an entry, `/`-separated.
    pub fn entry_path(&self, entry: &CacheEntry) -> Result<String> {
        let parent = self.dir_path(entry.parent_directory_index).ok_or_else(|| {
            CacheError::UnresolvedParent {
                name: entry.file_name.clone(),
                parent: entry.parent_directory_index,
            }
        })?;
        Ok(join_path(parent, &entry.file_name))
    }

    /// Relative paths of all files in stream order.
    pub fn file_paths(&self) -> impl Iterator<Item = String> + '_ {
        self.files.iter().map(|f| {
            // Parents were validated while parsing.
            let parent = self.dir_path(f.parent_directory_index).unwrap_or_default();
            join_path(parent, &f.file_name)
        })
    }

    /// Find a file by its resolved relative path.
    pub fn find_file(&self, path: &str) -> Result<&CacheEntry> {
        let wanted = path.replace('\\', "/");
        let wanted = wanted.trim_matches('/');
        let (dir, name) = match wanted.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", wanted),
        };
        self.files
            .iter()
            .find(|f| {
                f.file_name == name && self.dir_path(f.parent_directory_index) == Some(dir)
            })
            .ok_or_else(|| CacheError::NotFound(path.to_string()))
    }

    /// Files whose reserved scope field is non-zero.
    pub fn anomalies(&self) -> impl Iterator<Item = &CacheEntry> {
        self.files.iter().filter(|f| f.has_scope_anomaly())
    }

    /// Sum of decoded file sizes.
    pub fn total_length(&self) -> u64 {
        self.files.iter().map(|f| f.length.max(0) as u64).sum()
    }

    /// Sum of stored file sizes.
    pub fn total_compressed_length(&self) -> u64 {
        self.files
            .iter()
            .map(|f| f.compressed_length.max(0) as u64)
            .sum()
    }

    /// Number of files stored with block compression.
    pub fn count_compressed(&self) -> usize {
        self.files.iter().filter(|f| !f.is_stored_raw()).count()
    }
}

/// Join a directory path and a name with `/`, treating `""` as the root.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        parent.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Fill `buf` as far as the stream allows; returns the byte count.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
