//! Per-outer-batch pipeline: fetch, partition, assemble.
//!
//! `BatchLoader::load` is pure with respect to its inputs apart from the
//! record cache, takes `&self`, and is safe to call from many threads at
//! once. Index order and parallel fan-out live outside it (see
//! `OuterBatchSampler` and `WorkerPool`).

use std::sync::Arc;

use crate::assemble::{AssembledBatch, BatchAssembler};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::partition::BatchPartitioner;
use crate::record::Record;
use crate::sampler::OuterBatchSampler;
use crate::store::{RecordGenerator, RecordStore, StoreStats};

pub struct BatchLoader {
    store: RecordStore,
    partitioner: BatchPartitioner,
    assembler: BatchAssembler,
    outer_batch_size: usize,
    shuffle: bool,
    seed: u64,
}

impl BatchLoader {
    /// Compose a loader from prebuilt parts with sequential, unshuffled
    /// epochs of `outer_batch_size` indices.
    pub fn new(store: RecordStore, partitioner: BatchPartitioner, outer_batch_size: usize) -> Result<Self> {
        if outer_batch_size == 0 {
            return Err(LoaderError::Config("outer_batch_size must be > 0".into()));
        }
        Ok(Self {
            store,
            partitioner,
            assembler: BatchAssembler::new(),
            outer_batch_size,
            shuffle: false,
            seed: 0,
        })
    }

    /// File-backed loader.
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        let path = config.validate_file_mode()?;
        let store = RecordStore::open(path, config.max_cache_size)?;
        Self::with_store(config, store)
    }

    /// Generator-backed loader producing `config.epoch_size` samples per
    /// epoch. `input_source` and `max_cache_size` are ignored.
    pub fn from_config_with_generator(
        config: &LoaderConfig,
        generator: impl RecordGenerator + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let store = RecordStore::with_generator(generator, config.epoch_size);
        Self::with_store(config, store)
    }

    fn with_store(config: &LoaderConfig, store: RecordStore) -> Result<Self> {
        let partitioner = BatchPartitioner::new(config.memory_limit, config.hidden_dim)?;
        Ok(Self {
            store,
            partitioner,
            assembler: BatchAssembler::new(),
            outer_batch_size: config.outer_batch_size,
            shuffle: config.shuffle,
            seed: config.seed,
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn partitioner(&self) -> &BatchPartitioner {
        &self.partitioner
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn sampler(&self) -> OuterBatchSampler {
        OuterBatchSampler::new(self.store.len(), self.outer_batch_size, self.shuffle, self.seed)
    }

    /// Outer batches of logical indices for one epoch.
    pub fn epoch(&self, epoch: u64) -> Vec<Vec<usize>> {
        self.sampler().epoch(epoch)
    }

    /// Run one outer batch through the pipeline. Emits one batch per
    /// memory-safe segment, in partitioner order.
    pub fn load(&self, indices: &[usize]) -> Result<Vec<AssembledBatch>> {
        let records = self.store.get_many(indices)?;
        self.load_records(&records)
    }

    /// Partition and assemble records that are already in hand.
    pub fn load_records(&self, records: &[Arc<Record>]) -> Result<Vec<AssembledBatch>> {
        self.partitioner
            .partition(records)
            .iter()
            .map(|segment| {
                let members: Vec<&Record> = segment.iter().map(|&pos| records[pos].as_ref()).collect();
                self.assembler.assemble(&members)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GraphMap;

    /// Records with 5, 3 and 1 edges, plus the reserved trailing line.
    const LINES: &str = "[[5, 1], [1, 2, 3, 4, 5], [1, 1, 1, 1, 1], 1]\n\
                         [[2, 2], [1, -2, 1], [1, 1, 2], 0]\n\
                         [[1, 1], [-1], [1], 1]\n\
                         \n";

    fn loader(limit: u64) -> BatchLoader {
        let store = RecordStore::from_bytes(LINES, 16);
        BatchLoader::new(store, BatchPartitioner::new(limit, 1).unwrap(), 3).unwrap()
    }

    fn generator_config() -> LoaderConfig {
        LoaderConfig {
            epoch_size: 4,
            outer_batch_size: 2,
            memory_limit: 10,
            hidden_dim: 1,
            ..LoaderConfig::default()
        }
    }

    #[test]
    fn test_whole_batch_single_emission() {
        let batches = loader(100).load(&[0, 1, 2]).unwrap();
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        assert_eq!(batch.segment_size(), 3);
        assert_eq!(batch.variable_count(), 8);
        assert_eq!(batch.function_count(), 4);
        assert_eq!(batch.edge_count(), 9);
        assert_eq!(batch.label, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_outer_batch_splits_into_segments() {
        let batches = loader(6).load(&[0, 1, 2]).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.segment_size()).collect();
        assert_eq!(sizes, vec![1, 2]);

        // Second segment holds records 1 then 2, offset against each other.
        let second = &batches[1];
        assert_eq!(second.graph_map.variables, vec![0, 1, 0, 2]);
        assert_eq!(second.graph_map.functions, vec![0, 0, 1, 2]);
        assert_eq!(second.variable_segment_map, vec![0, 0, 1]);
        assert_eq!(second.function_segment_map, vec![0, 0, 1]);
        assert_eq!(second.label, vec![0.0, 1.0]);
    }

    #[test]
    fn test_index_order_is_respected() {
        let batches = loader(100).load(&[2, 0]).unwrap();
        assert_eq!(batches[0].label, vec![1.0, 1.0]);
        assert_eq!(batches[0].variable_segment_map[0], 0);
        assert_eq!(batches[0].variable_count(), 6);
        assert_eq!(batches[0].graph_map.variables[0], 0);
        assert_eq!(batches[0].graph_map.variables[1], 1);
    }

    #[test]
    fn test_empty_outer_batch() {
        assert!(loader(10).load(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_errors_propagate() {
        let err = loader(10).load(&[0, 7]).unwrap_err();
        assert!(matches!(err, LoaderError::IndexOutOfRange { index: 7, len: 3 }));
    }

    #[test]
    fn test_epoch_uses_outer_batch_size() {
        let epoch = loader(10).epoch(0);
        assert_eq!(epoch, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_generator_mode() {
        let loader = BatchLoader::from_config_with_generator(&generator_config(), || Record {
            variable_num: 2,
            function_num: 1,
            graph_map: GraphMap::new(vec![0, 1], vec![0, 0]),
            edge_feature: vec![1.0, -1.0],
            graph_feature: Some(vec![0.25]),
            label: 1.0,
        })
        .unwrap();

        assert_eq!(loader.len(), 4);
        let epoch = loader.epoch(0);
        assert_eq!(epoch.len(), 2);

        let batches = loader.load(&epoch[0]).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].graph_feature, Some(vec![vec![0.25], vec![0.25]]));
        assert_eq!(batches[0].graph_map.variables, vec![0, 1, 2, 3]);
        assert_eq!(loader.stats().generated, 2);
    }

    #[test]
    fn test_generator_records_are_validated() {
        // Endpoint beyond variable_num and an edge_feature longer than the edge list.
        let loader = BatchLoader::from_config_with_generator(&generator_config(), || Record {
            variable_num: 1,
            function_num: 1,
            graph_map: GraphMap::new(vec![3], vec![0]),
            edge_feature: vec![1.0, 1.0, 1.0],
            graph_feature: None,
            label: 0.0,
        })
        .unwrap();
        let err = loader.load(&[0, 1]).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidRecord { index: 0, .. }));
        assert_eq!(err.code(), "INVALID_RECORD");
    }

    #[test]
    fn test_generator_endpoint_at_u32_max_is_an_error() {
        let loader = BatchLoader::from_config_with_generator(&generator_config(), || Record {
            variable_num: 1,
            function_num: 1,
            graph_map: GraphMap::new(vec![u32::MAX], vec![0]),
            edge_feature: vec![1.0],
            graph_feature: None,
            label: 0.0,
        })
        .unwrap();
        assert!(matches!(
            loader.load(&[0, 1]),
            Err(LoaderError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_load_records_validates_caller_records() {
        let mut record = Record::clone(&loader(100).store().get(0).unwrap());
        record.edge_feature[0] = 2.0;
        let err = loader(100).load_records(&[Arc::new(record)]).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidRecord { index: 0, .. }));
    }

    #[test]
    fn test_zero_outer_batch_size_is_rejected() {
        let store = RecordStore::from_bytes(LINES, 16);
        let err = BatchLoader::new(store, BatchPartitioner::default(), 0).err().unwrap();
        assert!(matches!(err, LoaderError::Config(_)));
    }

    #[test]
    fn test_from_config_validates_before_opening() {
        let config = LoaderConfig {
            input_source: Some("/definitely/not/here.json".into()),
            hidden_dim: 0,
            ..LoaderConfig::default()
        };
        let err = BatchLoader::from_config(&config).err().unwrap();
        assert!(matches!(err, LoaderError::Config(_)));
    }
}
