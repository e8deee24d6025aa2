//! Metadata stream: wire format and directory parser.

pub mod format;
pub mod reader;
