//! Core data model types for cache entries.

pub mod entry;
