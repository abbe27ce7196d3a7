//! Record sources: the capability "given a logical index, produce a Record".
//!
//! Two variants, picked when the store is built:
//! - `FileSource`: parses lines of a line-addressed file through a bounded
//!   insertion-order cache.
//! - `GeneratorSource`: asks an external generator for a fresh sample on
//!   every call; never caches.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::record::Record;
use crate::store::cache::InsertionOrderCache;
use crate::store::line_index::LineIndex;
use crate::store::parse::parse_record_line;

/// Default upper bound on cached parsed records.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100_000;

/// Point-in-time counters for a record source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Lines parsed (cache misses that reached the parser).
    pub parses: u64,
    pub cache_hits: u64,
    pub evictions: u64,
    /// Records currently cached.
    pub cached: usize,
    /// Records produced by a generator.
    pub generated: u64,
}

pub trait RecordSource: Send + Sync {
    /// Number of logical records.
    fn len(&self) -> usize;

    /// Produce the record for `index`. Callers have already bounds-checked
    /// `index` against `len()`.
    fn fetch(&self, index: usize) -> Result<Arc<Record>>;

    fn stats(&self) -> StoreStats;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// External single-method producer of synthetic records.
pub trait RecordGenerator: Send + Sync {
    fn produce(&self) -> Record;
}

impl<F> RecordGenerator for F
where
    F: Fn() -> Record + Send + Sync,
{
    fn produce(&self) -> Record {
        self()
    }
}

// ── FileSource ──────────────────────────────────────────────────────

pub struct FileSource {
    lines: LineIndex,
    /// Logical record count: line count minus the reserved trailing line.
    len: usize,
    cache: Mutex<InsertionOrderCache<Arc<Record>>>,
    parses: AtomicU64,
    cache_hits: AtomicU64,
    evictions: AtomicU64,
}

impl FileSource {
    pub fn open(path: &Path, max_cache_size: usize) -> Result<Self> {
        let lines = LineIndex::open(path)?;
        let source = Self::from_line_index(lines, max_cache_size);
        tracing::info!(
            path = %path.display(),
            records = source.len,
            max_cache_size,
            "opened record file"
        );
        Ok(source)
    }

    pub fn from_line_index(lines: LineIndex, max_cache_size: usize) -> Self {
        let len = lines.line_count().saturating_sub(1);
        Self {
            lines,
            len,
            cache: Mutex::new(InsertionOrderCache::new(max_cache_size)),
            parses: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, InsertionOrderCache<Arc<Record>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordSource for FileSource {
    fn len(&self) -> usize {
        self.len
    }

    fn fetch(&self, index: usize) -> Result<Arc<Record>> {
        if let Some(record) = self.lock_cache().get(index) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(record));
        }

        // Parse outside the lock; reads of the mapping are independent.
        let raw = self.lines.line(index).unwrap_or_default();
        self.parses.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(parse_record_line(index, raw)?);

        let mut cache = self.lock_cache();
        if let Some(existing) = cache.get(index) {
            // Another reader inserted it first; keep a single entry.
            return Ok(Arc::clone(existing));
        }
        if let Some((evicted, _)) = cache.insert(index, Arc::clone(&record)) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(evicted, inserted = index, "record cache eviction");
        }
        Ok(record)
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            parses: self.parses.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            cached: self.lock_cache().len(),
            generated: 0,
        }
    }
}

// ── GeneratorSource ─────────────────────────────────────────────────

pub struct GeneratorSource {
    generator: Box<dyn RecordGenerator>,
    epoch_size: usize,
    generated: AtomicU64,
}

impl GeneratorSource {
    pub fn new(generator: Box<dyn RecordGenerator>, epoch_size: usize) -> Self {
        Self {
            generator,
            epoch_size,
            generated: AtomicU64::new(0),
        }
    }
}

impl RecordSource for GeneratorSource {
    fn len(&self) -> usize {
        self.epoch_size
    }

    fn fetch(&self, index: usize) -> Result<Arc<Record>> {
        self.generated.fetch_add(1, Ordering::Relaxed);
        let record = self.generator.produce();
        record.validate(index)?;
        Ok(Arc::new(record))
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            generated: self.generated.load(Ordering::Relaxed),
            ..StoreStats::default()
        }
    }
}
