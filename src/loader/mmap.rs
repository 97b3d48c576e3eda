//! Random-access byte sources for GGUF files
//!
//! The header parser and the sampler only ever need "give me `len` bytes at
//! `offset`". [`RangeReader`] captures that; [`MmapGguf`] serves it from a
//! memory-mapped file so sparse reads into a 50 GB model only fault in the
//! pages they touch, and [`MemorySource`] serves it from an owned buffer.

use crate::error::{AtlasError, AtlasResult};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

/// Read-only random access over a model file
///
/// Implementations must be shareable across sampling threads.
pub trait RangeReader: Send + Sync {
    /// Total size in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes starting at `offset`
    ///
    /// Fails with [`AtlasError::ReadOutOfBounds`] if the range extends past
    /// the end of the source.
    fn read_range(&self, offset: u64, len: usize) -> AtlasResult<Cow<'_, [u8]>>;
}

fn check_bounds(offset: u64, len: usize, file_len: u64) -> AtlasResult<(usize, usize)> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= file_len => Ok((offset as usize, end as usize)),
        _ => Err(AtlasError::ReadOutOfBounds {
            offset,
            len,
            file_len,
        }),
    }
}

/// Memory-mapped GGUF file
///
/// `MmapGguf` is `Send + Sync` because `memmap2::Mmap` is, and only
/// read-only access is exposed.
#[derive(Debug)]
pub struct MmapGguf {
    _file: File,
    mmap: Mmap,
}

impl MmapGguf {
    /// Open and memory-map a GGUF file
    pub fn open(path: &Path) -> AtlasResult<Self> {
        tracing::debug!("Opening GGUF file for memory-mapping: {:?}", path);

        let file = File::open(path)
            .map_err(|e| crate::error::io_context(e, &format!("opening '{}'", path.display())))?;

        // SAFETY: the mapping is read-only; a concurrent truncation by another
        // process is outside what this tool guards against.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            AtlasError::MmapError(format!("'{}': {}", path.display(), e))
        })?;

        tracing::debug!("Memory-mapped GGUF file: {} bytes", mmap.len());

        Ok(Self { _file: file, mmap })
    }

    /// Full file bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl RangeReader for MmapGguf {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_range(&self, offset: u64, len: usize) -> AtlasResult<Cow<'_, [u8]>> {
        let (start, end) = check_bounds(offset, len, self.len())?;
        Ok(Cow::Borrowed(&self.mmap[start..end]))
    }
}

/// Owned in-memory byte source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl RangeReader for MemorySource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_range(&self, offset: u64, len: usize) -> AtlasResult<Cow<'_, [u8]>> {
        let (start, end) = check_bounds(offset, len, self.len())?;
        Ok(Cow::Borrowed(&self.bytes[start..end]))
    }
}
