//! fgbatch: memory-bounded dynamic batching for bipartite factor-graph
//! datasets.
//!
//! Records (variables joined to functions by signed edges) are parsed
//! lazily from a line-addressed file through a bounded insertion-order
//! cache, split into memory-safe segments by a greedy partitioner, and
//! merged into one offset-consistent sparse structure per segment.

pub mod assemble;
pub mod config;
pub mod error;
pub mod loader;
pub mod partition;
pub mod record;
pub mod sampler;
pub mod store;
pub mod worker;

pub use assemble::{AssembledBatch, BatchAssembler, BatchParts};
pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use loader::BatchLoader;
pub use partition::{BatchPartitioner, Segment};
pub use record::{GraphMap, Record};
pub use sampler::OuterBatchSampler;
pub use store::{RecordGenerator, RecordSource, RecordStore, StoreStats};
pub use worker::{PoolRun, WorkerPool};
