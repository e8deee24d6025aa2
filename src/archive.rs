//! An Evolution cache on disk: a `.toc` metadata stream and a `.cache`
//! content stream sharing one base name.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CacheError, Result};
use crate::index::reader::CacheDirectory;
use crate::store::reader::ContentStore;

/// Extension of the metadata stream.
pub const TOC_EXTENSION: &str = "toc";

/// Extension of the content stream.
pub const CACHE_EXTENSION: &str = "cache";

/// Locations of the two streams that make up one cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub toc: PathBuf,
    pub cache: PathBuf,
}

impl CachePaths {
    /// Resolve both streams from either file's path or the bare base name.
    ///
    /// `data/world.toc`, `data/world.cache` and `data/world` all resolve to
    /// the same pair. A name with any other extension keeps it:
    /// `data/world.v2` becomes `data/world.v2.toc` / `data/world.v2.cache`.
    pub fn resolve(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let has_known_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                e.eq_ignore_ascii_case(TOC_EXTENSION) || e.eq_ignore_ascii_case(CACHE_EXTENSION)
            })
            .unwrap_or(false);

        let base = if has_known_ext {
            path.to_path_buf()
        } else {
            let mut name = OsString::from(path.as_os_str());
            name.push(".");
            name.push(CACHE_EXTENSION);
            PathBuf::from(name)
        };

        Self {
            toc: base.with_extension(TOC_EXTENSION),
            cache: base.with_extension(CACHE_EXTENSION),
        }
    }
}

/// Default extraction directory: the path as given plus `suffix`.
///
/// Example: `data/world.cache` with `_extracted` → `data/world.cache_extracted`
pub fn default_output_dir(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// An open cache: the parsed directory plus the content stream.
pub struct Archive {
    paths: CachePaths,
    toc: File,
    directory: CacheDirectory,
    store: ContentStore,
}

impl Archive {
    /// Open both streams and parse the metadata stream.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self> {
        let paths = CachePaths::resolve(path);
        let toc = File::open(&paths.toc).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CacheError::FileNotFound(paths.toc.clone())
            } else {
                CacheError::io(&paths.toc, e)
            }
        })?;
        let store = ContentStore::open(&paths.cache, buffer_size)?;

        info!(toc = %paths.toc.display(), cache = %paths.cache.display(), "Opening cache");
        let directory = parse_toc(&toc, &paths.toc)?;

        Ok(Self {
            paths,
            toc,
            directory,
            store,
        })
    }

    /// Re-read the metadata stream from the start, replacing all state.
    pub fn reload(&mut self) -> Result<()> {
        self.directory = parse_toc(&self.toc, &self.paths.toc)?;
        Ok(())
    }

    /// Paths of the two streams.
    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// The parsed metadata.
    pub fn directory(&self) -> &CacheDirectory {
        &self.directory
    }

    /// Split borrow for extraction: metadata read-only, store mutable.
    pub fn parts_mut(&mut self) -> (&CacheDirectory, &mut ContentStore) {
        (&self.directory, &mut self.store)
    }

    /// Decode one file, looked up by its relative path, into memory.
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let entry = self.directory.find_file(path)?;
        self.store.read_entry(entry)
    }
}

fn parse_toc(mut toc: &File, path: &Path) -> Result<CacheDirectory> {
    toc.seek(SeekFrom::Start(0))
        .map_err(|e| CacheError::io(path, e))?;
    CacheDirectory::read_from(BufReader::new(toc)).map_err(|e| match e {
        CacheError::Io { source, .. } => CacheError::io(path, source),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_either_extension() {
        let expected = CachePaths {
            toc: PathBuf::from("data/world.toc"),
            cache: PathBuf::from("data/world.cache"),
        };
        assert_eq!(CachePaths::resolve("data/world.toc"), expected);
        assert_eq!(CachePaths::resolve("data/world.cache"), expected);
        assert_eq!(CachePaths::resolve("data/world"), expected);
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let paths = CachePaths::resolve("data/WORLD.TOC");
        assert_eq!(paths.toc, PathBuf::from("data/WORLD.toc"));
        assert_eq!(paths.cache, PathBuf::from("data/WORLD.cache"));
    }

    #[test]
    fn test_resolve_keeps_unknown_extension() {
        let paths = CachePaths::resolve("data/world.v2");
        assert_eq!(paths.toc, PathBuf::from("data/world.v2.toc"));
        assert_eq!(paths.cache, PathBuf::from("data/world.v2.cache"));
    }

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("data/world.cache"), "_extracted"),
            PathBuf::from("data/world.cache_extracted")
        );
    }
}
