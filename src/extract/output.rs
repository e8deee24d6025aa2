//! Output path construction and file timestamps.

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::error::{CacheError, Result};
use crate::model::entry::CacheEntry;

/// Map a `/`-separated relative path from the cache onto `root`.
///
/// Backslashes count as separators too. Components that would leave
/// `root` (`..`, absolute prefixes, drive letters) are rejected.
pub fn output_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut out = root.to_path_buf();
    let mut depth = 0usize;

    for part in relative.split(['/', '\\']) {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." || part.contains(':') {
            return Err(CacheError::UnsafePath(relative.to_string()));
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(CacheError::UnsafePath(relative.to_string())),
        }
        out.push(part);
        depth += 1;
    }

    if depth == 0 {
        return Err(CacheError::UnsafePath(relative.to_string()));
    }
    Ok(out)
}

/// Apply the entry's modification time to an open output file.
///
/// Returns `false` when the time is unknown and the file was left alone.
pub fn apply_mod_time(file: &File, entry: &CacheEntry, path: &Path) -> Result<bool> {
    match entry.modified() {
        Some(when) => {
            file.set_modified(SystemTime::from(when))
                .map_err(|e| CacheError::io(path, e))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_output_path() {
        let root = Path::new("/out");
        assert_eq!(
            output_path(root, "sub/a.txt").unwrap(),
            Path::new("/out").join("sub").join("a.txt")
        );
        assert_eq!(
            output_path(root, "sub\\deeper\\b.bin").unwrap(),
            Path::new("/out").join("sub").join("deeper").join("b.bin")
        );
    }

    #[test]
    fn test_rejects_escapes() {
        let root = Path::new("/out");
        for bad in ["../etc/passwd", "sub/../../x", "C:\\windows", "", "/", "./."] {
            assert!(
                matches!(output_path(root, bad), Err(CacheError::UnsafePath(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_leading_separator_stays_inside_root() {
        assert_eq!(
            output_path(Path::new("/out"), "/a.txt").unwrap(),
            Path::new("/out").join("a.txt")
        );
    }
}
