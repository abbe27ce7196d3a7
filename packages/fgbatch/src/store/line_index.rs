//! Line-addressed view over a newline-delimited record file.
//!
//! The file is memory-mapped once and scanned for line starts at open time,
//! so `line(n)` is an O(1) slice into the mapping. Line counting follows
//! "readlines" semantics: a last line without a trailing newline still
//! counts, and an empty file has zero lines.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{LoaderError, Result};

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => mmap,
            Backing::Owned(bytes) => bytes,
        }
    }
}

/// Immutable line index over a memory-mapped (or in-memory) text file.
pub struct LineIndex {
    backing: Backing,
    /// Byte offset of the first byte of every line.
    starts: Vec<usize>,
}

impl LineIndex {
    /// Map a file and index its lines.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(LoaderError::Io)?;
        let len = file.metadata().map_err(LoaderError::Io)?.len();

        // Zero-length mappings are rejected by some platforms.
        let backing = if len == 0 {
            Backing::Owned(Vec::new())
        } else {
            let mmap = unsafe { Mmap::map(&file) }.map_err(LoaderError::Io)?;
            Backing::Mapped(mmap)
        };

        Ok(Self::with_backing(backing))
    }

    /// Index an in-memory buffer (for testing / embedding).
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_backing(Backing::Owned(bytes.into()))
    }

    fn with_backing(backing: Backing) -> Self {
        let starts = scan_line_starts(backing.bytes());
        Self { backing, starts }
    }

    /// Number of lines in the file.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Raw bytes of zero-based line `n`, without the line terminator.
    pub fn line(&self, n: usize) -> Option<&[u8]> {
        let start = *self.starts.get(n)?;
        let bytes = self.backing.bytes();
        let end = self.starts.get(n + 1).copied().unwrap_or(bytes.len());

        let mut line = &bytes[start..end];
        if let Some(rest) = line.strip_suffix(b"\n") {
            line = rest;
        }
        if let Some(rest) = line.strip_suffix(b"\r") {
            line = rest;
        }
        Some(line)
    }
}

fn scan_line_starts(bytes: &[u8]) -> Vec<usize> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let mut starts = vec![0];
    for (pos, byte) in bytes.iter().enumerate() {
        if *byte == b'\n' && pos + 1 < bytes.len() {
            starts.push(pos + 1);
        }
    }
    starts
}
