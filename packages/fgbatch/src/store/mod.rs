//! Lazily parsed record store.
//!
//! `RecordStore` owns one `RecordSource` (file-backed or generator-backed),
//! enforces the shared `[0, len)` bounds contract, and hands out records as
//! `Arc<Record>`.

pub mod cache;
pub mod line_index;
pub mod parse;
pub mod source;

pub use cache::InsertionOrderCache;
pub use line_index::LineIndex;
pub use parse::parse_record_line;
pub use source::{
    FileSource, GeneratorSource, RecordGenerator, RecordSource, StoreStats,
    DEFAULT_MAX_CACHE_SIZE,
};

use std::path::Path;
use std::sync::Arc;

use crate::error::{LoaderError, Result};
use crate::record::Record;

pub struct RecordStore {
    source: Box<dyn RecordSource>,
}

impl RecordStore {
    pub fn new(source: Box<dyn RecordSource>) -> Self {
        Self { source }
    }

    /// File-backed store over a newline-delimited record file.
    pub fn open(path: &Path, max_cache_size: usize) -> Result<Self> {
        Ok(Self::new(Box::new(FileSource::open(path, max_cache_size)?)))
    }

    /// File-backed store over an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, max_cache_size: usize) -> Self {
        let lines = LineIndex::from_bytes(bytes);
        Self::new(Box::new(FileSource::from_line_index(lines, max_cache_size)))
    }

    /// Generator-backed store yielding `epoch_size` synthetic records.
    pub fn with_generator(generator: impl RecordGenerator + 'static, epoch_size: usize) -> Self {
        Self::new(Box::new(GeneratorSource::new(Box::new(generator), epoch_size)))
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<Arc<Record>> {
        let len = self.source.len();
        if index >= len {
            return Err(LoaderError::IndexOutOfRange { index, len });
        }
        self.source.fetch(index)
    }

    /// Fetch several records in order. Fails on the first error.
    pub fn get_many(&self, indices: &[usize]) -> Result<Vec<Arc<Record>>> {
        indices.iter().map(|&index| self.get(index)).collect()
    }

    pub fn stats(&self) -> StoreStats {
        self.source.stats()
    }
}
