//! Builds small synthetic caches for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub const MAGIC: u32 = 0x1867_C64E;

/// 2013-01-01T00:00:00Z as a Windows FILETIME.
pub const FILETIME_2013: i64 = 130_014_720_000_000_000;

/// Unix seconds for [`FILETIME_2013`].
pub const UNIX_2013: u64 = 1_356_998_400;

pub struct CacheBuilder {
    pub toc: Vec<u8>,
    pub content: Vec<u8>,
}

impl CacheBuilder {
    pub fn new(version: i32) -> Self {
        Self::with_magic(MAGIC, version)
    }

    pub fn with_magic(magic: u32, version: i32) -> Self {
        let mut toc = Vec::new();
        toc.write_u32::<LittleEndian>(magic).unwrap();
        toc.write_i32::<LittleEndian>(version).unwrap();
        Self {
            toc,
            content: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        offset: i64,
        mod_time: i64,
        compressed: i32,
        length: i32,
        parent: i32,
        name: &str,
    ) -> &mut Self {
        self.toc.write_i64::<LittleEndian>(offset).unwrap();
        self.toc.write_i64::<LittleEndian>(mod_time).unwrap();
        self.toc.write_i32::<LittleEndian>(compressed).unwrap();
        self.toc.write_i32::<LittleEndian>(length).unwrap();
        self.toc.write_i32::<LittleEndian>(0).unwrap();
        self.toc.write_i32::<LittleEndian>(parent).unwrap();
        let mut slot = [0u8; 64];
        slot[..name.len()].copy_from_slice(name.as_bytes());
        self.toc.extend_from_slice(&slot);
        self
    }

    pub fn dir(&mut self, parent: i32, name: &str) -> &mut Self {
        self.record(-1, -1, 0, 0, parent, name)
    }

    /// Pad the content stream so the next payload starts at `offset`.
    pub fn pad_to(&mut self, offset: usize) -> &mut Self {
        if self.content.len() < offset {
            self.content.resize(offset, 0xAA);
        }
        self
    }

    pub fn raw_file(&mut self, parent: i32, name: &str, data: &[u8], mod_time: i64) -> &mut Self {
        let offset = self.content.len() as i64;
        self.content.extend_from_slice(data);
        let len = data.len() as i32;
        self.record(offset, mod_time, len, len, parent, name)
    }

    /// `blocks` are `(decompressed_len, payload)`; a payload whose length
    /// equals its decompressed length is a stored block.
    pub fn framed_file(
        &mut self,
        parent: i32,
        name: &str,
        blocks: &[(u16, Vec<u8>)],
        length: i32,
    ) -> &mut Self {
        let offset = self.content.len();
        for (decompressed, payload) in blocks {
            self.content
                .write_u16::<BigEndian>(payload.len() as u16)
                .unwrap();
            self.content.write_u16::<BigEndian>(*decompressed).unwrap();
            self.content.extend_from_slice(payload);
        }
        let compressed = (self.content.len() - offset) as i32;
        self.record(offset as i64, -1, compressed, length, parent, name)
    }

    /// Write `<dir>/<base>.toc` and `<dir>/<base>.cache`; returns the base path.
    pub fn write(&self, dir: &Path, base: &str) -> PathBuf {
        let base_path = dir.join(base);
        std::fs::write(base_path.with_extension("toc"), &self.toc).unwrap();
        std::fs::write(base_path.with_extension("cache"), &self.content).unwrap();
        base_path
    }
}
