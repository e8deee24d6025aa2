//! Per-file and batch extraction.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::extract::output::{apply_mod_time, output_path};
use crate::index::reader::CacheDirectory;
use crate::model::entry::CacheEntry;
use crate::store::reader::ContentStore;

/// Extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Copy each entry's modification time onto the output file.
    pub preserve_mtime: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            preserve_mtime: true,
        }
    }
}

/// A file that could not be extracted.
#[derive(Debug)]
pub struct ExtractFailure {
    /// Relative path inside the cache (or the bare name if unresolvable).
    pub path: String,
    pub error: CacheError,
}

/// Outcome of a batch extraction.
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Files written successfully.
    pub extracted: usize,
    /// Decoded bytes written across all successful files.
    pub bytes_written: u64,
    /// Files skipped because of an error, in stream order.
    pub failures: Vec<ExtractFailure>,
}

impl ExtractReport {
    /// True when every file was extracted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extract every file in `directory` below `dest`.
///
/// A failure on one file is logged and recorded in the report; the batch
/// moves on to the next file. Only a destination root that cannot be
/// created is returned as an error.
pub fn extract_all<R: Read + Seek>(
    directory: &CacheDirectory,
    store: &mut ContentStore<R>,
    dest: &Path,
    options: &ExtractOptions,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Result<ExtractReport> {
    std::fs::create_dir_all(dest).map_err(|e| CacheError::io(dest, e))?;

    let files = directory.files();
    let total = files.len();
    let mut report = ExtractReport::default();
    info!(dest = %dest.display(), files = total, "Extracting cache");

    for (i, entry) in files.iter().enumerate() {
        if let Some(cb) = progress {
            cb(i, total);
        }
        match extract_entry(directory, store, entry, dest, options) {
            Ok((_, written)) => {
                report.extracted += 1;
                report.bytes_written += written;
            }
            Err(error) => {
                let path = directory
                    .entry_path(entry)
                    .unwrap_or_else(|_| entry.file_name.clone());
                warn!(path = %path, error = %error, "Failed to extract file");
                report.failures.push(ExtractFailure { path, error });
            }
        }
    }
    if let Some(cb) = progress {
        cb(total, total);
    }

    info!(
        extracted = report.extracted,
        failed = report.failures.len(),
        bytes = report.bytes_written,
        "Extraction finished"
    );
    Ok(report)
}

/// Extract the file at `relative` (as listed by the cache) below `dest`.
pub fn extract_path<R: Read + Seek>(
    directory: &CacheDirectory,
    store: &mut ContentStore<R>,
    relative: &str,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<PathBuf> {
    let entry = directory.find_file(relative)?;
    extract_entry(directory, store, entry, dest, options).map(|(path, _)| path)
}

/// Extract a single file entry below `dest`.
///
/// Returns the output path and the number of bytes written. An output
/// file left incomplete by an error is removed. Write failures name the
/// output file, read failures the content stream.
pub fn extract_entry<R: Read + Seek>(
    directory: &CacheDirectory,
    store: &mut ContentStore<R>,
    entry: &CacheEntry,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<(PathBuf, u64)> {
    if entry.file_name.is_empty() {
        return Err(CacheError::InvalidEntry {
            name: String::new(),
            reason: "empty file name".into(),
        });
    }
    let relative = directory.entry_path(entry)?;
    let path = output_path(dest, &relative)?;
    debug!(path = %relative, "Extracting");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }

    write_entry(store, entry, &path, options).map(|written| (path, written))
}

/// Create and fill one output file. A file this call created is removed
/// again if filling it fails.
fn write_entry<R: Read + Seek>(
    store: &mut ContentStore<R>,
    entry: &CacheEntry,
    path: &Path,
    options: &ExtractOptions,
) -> Result<u64> {
    let file = File::create(path).map_err(|e| CacheError::io(path, e))?;
    let result = fill_file(store, entry, file, path, options);
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "Could not remove partial output");
        }
    }
    result
}

/// Fill, flush and close `file`.
fn fill_file<R: Read + Seek>(
    store: &mut ContentStore<R>,
    entry: &CacheEntry,
    file: File,
    path: &Path,
    options: &ExtractOptions,
) -> Result<u64> {
    let mut writer = BufWriter::new(file);
    let written = store
        .copy_entry(entry, &mut writer)
        .map_err(|e| e.at_output(path))?;
    writer.flush().map_err(|e| CacheError::io(path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| CacheError::io(path, e.into_error()))?;

    if options.preserve_mtime && !apply_mod_time(&file, entry, path)? {
        debug!(path = %path.display(), "Modification time unknown");
    }
    Ok(written)
}
