//! `evocache` — reader and extractor for Evolution engine caches.
//!
//! A cache is a pair of streams: a `.toc` metadata stream listing a
//! directory tree in fixed-size records, and a `.cache` content stream
//! holding raw or block-compressed file payloads. This crate parses the
//! former, decodes the latter, and writes the tree back to disk.

pub mod archive;
pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod model;
pub mod store;
