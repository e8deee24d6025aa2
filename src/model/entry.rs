//! Metadata record for a single file or directory in a cache.

use chrono::{DateTime, Utc};

/// `offset` value that marks a directory record.
pub const DIRECTORY_OFFSET: i64 = -1;

/// `mod_time` value that marks an unknown modification time.
pub const UNKNOWN_TIME: i64 = -1;

/// 100-ns ticks between 1601-01-01 and the Unix epoch.
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// One fixed-size record from the metadata stream, fields kept as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Byte offset of the payload in the content stream, or
    /// [`DIRECTORY_OFFSET`] for directories.
    pub offset: i64,

    /// Windows FILETIME of the last modification, or [`UNKNOWN_TIME`].
    pub mod_time: i64,

    /// Size of the payload as stored in the content stream.
    pub compressed_length: i32,

    /// Size of the payload once decoded.
    pub length: i32,

    /// Reserved field; zero for every file in known caches.
    pub scope_index: i32,

    /// Index into the directory table (0 is the root).
    pub parent_directory_index: i32,

    /// Name with the trailing NUL padding removed.
    pub file_name: String,
}

impl CacheEntry {
    /// Directories are identified by the offset sentinel and nothing else.
    pub fn is_directory(&self) -> bool {
        self.offset == DIRECTORY_OFFSET
    }

    /// Payload is stored without block framing.
    pub fn is_stored_raw(&self) -> bool {
        self.length == self.compressed_length
    }

    /// Non-zero reserved field on a file record.
    pub fn has_scope_anomaly(&self) -> bool {
        !self.is_directory() && self.scope_index != 0
    }

    /// Modification time as UTC, `None` when unknown or out of range.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        filetime_to_utc(self.mod_time)
    }
}

/// Convert a Windows FILETIME to UTC.
pub fn filetime_to_utc(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime < 0 {
        return None;
    }
    let since_unix = filetime - FILETIME_UNIX_EPOCH;
    let secs = since_unix.div_euclid(FILETIME_TICKS_PER_SEC);
    let nanos = since_unix.rem_euclid(FILETIME_TICKS_PER_SEC) * 100;
    DateTime::from_timestamp(secs, nanos as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(offset: i64) -> CacheEntry {
        CacheEntry {
            offset,
            mod_time: UNKNOWN_TIME,
            compressed_length: 10,
            length: 10,
            scope_index: 0,
            parent_directory_index: 0,
            file_name: "x".into(),
        }
    }

    #[test]
    fn test_directory_is_offset_sentinel_only() {
        assert!(entry(-1).is_directory());
        assert!(!entry(0).is_directory());
        assert!(!entry(-2).is_directory());
    }

    #[test]
    fn test_unknown_time() {
        assert_eq!(entry(0).modified(), None);
    }

    #[test]
    fn test_filetime_conversion() {
        assert_eq!(
            filetime_to_utc(FILETIME_UNIX_EPOCH).map(|d| d.timestamp()),
            Some(0)
        );
        // 2013-01-01T00:00:00Z
        let dt = filetime_to_utc(130_014_720_000_000_000).unwrap();
        assert_eq!(dt.to_rfc3339(), "2013-01-01T00:00:00+00:00");
        // Before 1970 is still a valid instant
        let early = filetime_to_utc(0).unwrap();
        assert_eq!(early.format("%Y-%m-%d").to_string(), "1601-01-01");
    }

    #[test]
    fn test_scope_anomaly_only_for_files() {
        let mut dir = entry(-1);
        dir.scope_index = 7;
        assert!(!dir.has_scope_anomaly());
        let mut file = entry(4);
        file.scope_index = 7;
        assert!(file.has_scope_anomaly());
    }
}
