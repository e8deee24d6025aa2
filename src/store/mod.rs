//! Random-access reading of the content stream.

pub mod reader;
