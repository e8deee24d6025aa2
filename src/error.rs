//! Centralized error types for evocache.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// All errors produced by the evocache library.
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing decoded data to the caller's sink failed. The extract layer
    /// turns this into `Io` with the output file's path.
    #[error("Failed to write decoded data: {0}")]
    Output(std::io::Error),

    /// The archive file does not exist.
    #[error("Cache file not found: {0}")]
    FileNotFound(PathBuf),

    /// The metadata stream does not start with the cache magic.
    #[error("Not an Evolution cache: bad magic 0x{found:08x}")]
    InvalidMagic { found: u32 },

    /// The header names a version this reader does not understand.
    #[error("Unsupported cache version {0}")]
    UnsupportedVersion(i32),

    /// A stream ended in the middle of a fixed-size structure.
    #[error("Truncated {what} at offset {offset}")]
    Truncated { what: &'static str, offset: u64 },

    /// An entry references a directory index that has not been read yet.
    #[error("Entry '{name}' references unresolved directory index {parent}")]
    UnresolvedParent { name: String, parent: i32 },

    /// The block decoder would read or write outside its buffers.
    #[error("Decoder bounds error at input position {position}: {reason}")]
    Bounds {
        reason: &'static str,
        position: usize,
    },

    /// Decoded size differs from the declared size.
    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    /// A framed block can never make progress.
    #[error("Corrupt block at offset {offset}: {reason}")]
    CorruptBlock { offset: u64, reason: String },

    /// A file record carries values that cannot address the content stream.
    #[error("Invalid entry '{name}': {reason}")]
    InvalidEntry { name: String, reason: String },

    /// A name would place output outside the destination root.
    #[error("Unsafe path in cache: {0}")]
    UnsafePath(String),

    /// No file with the requested path exists in the cache.
    #[error("Cannot find file {0} in cache")]
    NotFound(String),
}

/// Convenience alias for `Result<T, CacheError>`.
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the output file path to an `Output` error; other errors pass
    /// through unchanged.
    pub fn at_output(self, path: &Path) -> Self {
        match self {
            Self::Output(source) => Self::io(path, source),
            other => other,
        }
    }

    /// True for errors that mean the metadata stream itself is unusable.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic { .. }
                | Self::UnsupportedVersion(_)
                | Self::Truncated { .. }
                | Self::UnresolvedParent { .. }
        )
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (prefer `CacheError::io`).
impl From<std::io::Error> for CacheError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_at_output_tags_only_write_errors() {
        let err = CacheError::Output(Error::new(ErrorKind::StorageFull, "disk full"))
            .at_output(Path::new("out/a.txt"));
        assert!(matches!(&err, CacheError::Io { path, .. } if path == Path::new("out/a.txt")));

        let err = CacheError::io("game.cache", Error::other("bad sector"))
            .at_output(Path::new("out/a.txt"));
        assert!(matches!(&err, CacheError::Io { path, .. } if path == Path::new("game.cache")));

        let err = CacheError::NotFound("x".into()).at_output(Path::new("out/a.txt"));
        assert!(matches!(err, CacheError::NotFound(_)));
    }
}
