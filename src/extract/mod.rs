//! Materializing cache contents on disk.

pub mod batch;
pub mod output;

pub use batch::{
    extract_all, extract_entry, extract_path, ExtractFailure, ExtractOptions, ExtractReport,
};
