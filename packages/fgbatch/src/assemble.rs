//! Segment assembly: fold several independently indexed graphs into one
//! combined sparse structure.
//!
//! Records are laid out back to back in segment order. Each record's
//! variable indices are shifted by the number of variables before it (and
//! likewise for functions), so the combined index spaces never collide.

use serde::Serialize;

use crate::error::{LoaderError, Result};
use crate::record::{GraphMap, Record};

/// One segment merged into a single graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledBatch {
    /// Globally offset `(variable, function)` incidences, 2 x sum(E).
    pub graph_map: GraphMap,
    /// Segment position of the record owning each variable row.
    pub variable_segment_map: Vec<u32>,
    /// Segment position of the record owning each function row.
    pub function_segment_map: Vec<u32>,
    pub edge_feature: Vec<f32>,
    /// One row per record, or `None` for the whole segment.
    pub graph_feature: Option<Vec<Vec<f32>>>,
    pub label: Vec<f32>,
}

/// Per-emission output tuple:
/// `(graph_map, variable_segment_map, function_segment_map, edge_feature,
/// graph_feature, label)`.
pub type BatchParts = (
    GraphMap,
    Vec<u32>,
    Vec<u32>,
    Vec<f32>,
    Option<Vec<Vec<f32>>>,
    Vec<f32>,
);

impl AssembledBatch {
    /// Number of records merged into this batch.
    pub fn segment_size(&self) -> usize {
        self.label.len()
    }

    /// Total variables (sum of `variable_num`).
    pub fn variable_count(&self) -> usize {
        self.variable_segment_map.len()
    }

    /// Total functions (sum of `function_num`).
    pub fn function_count(&self) -> usize {
        self.function_segment_map.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph_map.edge_count()
    }

    /// Edge count of each member record, recovered from the segment maps.
    pub fn edges_per_record(&self) -> Vec<usize> {
        let mut counts = vec![0; self.segment_size()];
        for &variable in &self.graph_map.variables {
            let owner = self.variable_segment_map[variable as usize] as usize;
            counts[owner] += 1;
        }
        counts
    }

    pub fn into_parts(self) -> BatchParts {
        (
            self.graph_map,
            self.variable_segment_map,
            self.function_segment_map,
            self.edge_feature,
            self.graph_feature,
            self.label,
        )
    }
}

/// Stateless merger; shared freely between workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchAssembler;

impl BatchAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Merge `records` in the given order. Whether the batch carries graph
    /// features is decided by the first record. Each record is validated
    /// first; an `InvalidRecord` error names its segment position.
    pub fn assemble<R>(&self, records: &[R]) -> Result<AssembledBatch>
    where
        R: AsRef<Record>,
    {
        let total_edges: usize = records.iter().map(|r| r.as_ref().edge_count()).sum();
        let total_variables: u64 = records.iter().map(|r| u64::from(r.as_ref().variable_num)).sum();
        let total_functions: u64 = records.iter().map(|r| u64::from(r.as_ref().function_num)).sum();
        for total in [total_variables, total_functions, records.len() as u64] {
            if total > u64::from(u32::MAX) {
                return Err(LoaderError::IndexOverflow(total));
            }
        }

        let mut batch = AssembledBatch {
            graph_map: GraphMap::with_capacity(total_edges),
            variable_segment_map: Vec::with_capacity(total_variables as usize),
            function_segment_map: Vec::with_capacity(total_functions as usize),
            edge_feature: Vec::with_capacity(total_edges),
            graph_feature: None,
            label: Vec::with_capacity(records.len()),
        };

        let feature_width = records
            .first()
            .and_then(|r| r.as_ref().graph_feature.as_ref())
            .map(Vec::len);
        let mut features = feature_width.map(|_| Vec::with_capacity(records.len()));

        let mut variable_offset: u32 = 0;
        let mut function_offset: u32 = 0;

        for (position, record) in records.iter().enumerate() {
            let record = record.as_ref();
            record.validate(position)?;
            let position_id = position as u32;

            batch
                .graph_map
                .variables
                .extend(record.graph_map.variables.iter().map(|v| v + variable_offset));
            batch
                .graph_map
                .functions
                .extend(record.graph_map.functions.iter().map(|f| f + function_offset));
            batch.edge_feature.extend_from_slice(&record.edge_feature);

            batch
                .variable_segment_map
                .extend(std::iter::repeat(position_id).take(record.variable_num as usize));
            batch
                .function_segment_map
                .extend(std::iter::repeat(position_id).take(record.function_num as usize));
            batch.label.push(record.label);

            if let (Some(rows), Some(width)) = (features.as_mut(), feature_width) {
                rows.push(graph_feature_row(record, position, width)?);
            }

            variable_offset += record.variable_num;
            function_offset += record.function_num;
        }

        debug_assert_eq!(u64::from(variable_offset), total_variables);
        debug_assert_eq!(u64::from(function_offset), total_functions);

        batch.graph_feature = features;
        Ok(batch)
    }
}

fn graph_feature_row(record: &Record, position: usize, width: usize) -> Result<Vec<f32>> {
    match &record.graph_feature {
        Some(row) if row.len() == width => Ok(row.clone()),
        Some(row) => Err(LoaderError::InconsistentGraphFeature {
            position,
            reason: format!("expected width {width}, got {}", row.len()),
        }),
        None => Err(LoaderError::InconsistentGraphFeature {
            position,
            reason: "missing while the first record carries one".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(variable_num: u32, function_num: u32, edges: &[(u32, u32, f32)], label: f32) -> Record {
        Record {
            variable_num,
            function_num,
            graph_map: GraphMap::new(
                edges.iter().map(|e| e.0).collect(),
                edges.iter().map(|e| e.1).collect(),
            ),
            edge_feature: edges.iter().map(|e| e.2).collect(),
            graph_feature: None,
            label,
        }
    }

    fn with_feature(mut r: Record, feature: &[f32]) -> Record {
        r.graph_feature = Some(feature.to_vec());
        r
    }

    #[test]
    fn test_offsets_and_segment_maps() {
        let a = record(2, 1, &[(0, 0, 1.0), (1, 0, -1.0)], 1.0);
        let b = record(3, 2, &[(0, 1, -1.0), (2, 0, 1.0), (1, 1, 1.0)], 0.0);

        let batch = BatchAssembler::new().assemble(&[a, b]).unwrap();

        assert_eq!(batch.graph_map.variables, vec![0, 1, 2, 4, 3]);
        assert_eq!(batch.graph_map.functions, vec![0, 0, 2, 1, 2]);
        assert_eq!(batch.edge_feature, vec![1.0, -1.0, -1.0, 1.0, 1.0]);
        assert_eq!(batch.variable_segment_map, vec![0, 0, 1, 1, 1]);
        assert_eq!(batch.function_segment_map, vec![0, 1, 1]);
        assert_eq!(batch.label, vec![1.0, 0.0]);
        assert_eq!(batch.graph_feature, None);

        assert_eq!(batch.segment_size(), 2);
        assert_eq!(batch.variable_count(), 5);
        assert_eq!(batch.function_count(), 3);
        assert_eq!(batch.edge_count(), 5);
        assert_eq!(batch.edges_per_record(), vec![2, 3]);
    }

    #[test]
    fn test_max_indices_match_totals() {
        let records = vec![
            record(1, 1, &[(0, 0, 1.0)], 0.0),
            record(4, 2, &[(3, 1, 1.0), (0, 0, -1.0)], 1.0),
            record(2, 3, &[(1, 2, -1.0)], 1.0),
        ];
        let batch = BatchAssembler::new().assemble(&records).unwrap();

        assert_eq!(batch.graph_map.variables.iter().max(), Some(&6)); // sum(V) - 1
        assert_eq!(batch.graph_map.functions.iter().max(), Some(&5)); // sum(F) - 1
    }

    #[test]
    fn test_singleton_keeps_record_map() {
        let r = record(3, 2, &[(2, 1, 1.0), (0, 0, -1.0)], 1.0);
        let batch = BatchAssembler::new().assemble(std::slice::from_ref(&r)).unwrap();
        assert_eq!(batch.graph_map, r.graph_map);
        assert_eq!(batch.edge_feature, r.edge_feature);
    }

    #[test]
    fn test_isolated_nodes_still_get_segment_rows() {
        // Record 0 has a variable and a function that no edge touches.
        let records = vec![record(2, 2, &[(0, 0, 1.0)], 0.0), record(1, 1, &[(0, 0, 1.0)], 1.0)];
        let batch = BatchAssembler::new().assemble(&records).unwrap();

        assert_eq!(batch.graph_map.variables, vec![0, 2]);
        assert_eq!(batch.graph_map.functions, vec![0, 2]);
        assert_eq!(batch.variable_segment_map, vec![0, 0, 1]);
    }

    #[test]
    fn test_graph_features_are_stacked() {
        let records = vec![
            with_feature(record(1, 1, &[(0, 0, 1.0)], 0.0), &[0.5, 1.0]),
            with_feature(record(1, 1, &[(0, 0, 1.0)], 1.0), &[2.0, 3.0]),
        ];
        let batch = BatchAssembler::new().assemble(&records).unwrap();
        assert_eq!(batch.graph_feature, Some(vec![vec![0.5, 1.0], vec![2.0, 3.0]]));
    }

    #[test]
    fn test_first_record_decides_feature_absence() {
        let records = vec![
            record(1, 1, &[(0, 0, 1.0)], 0.0),
            with_feature(record(1, 1, &[(0, 0, 1.0)], 1.0), &[2.0]),
        ];
        let batch = BatchAssembler::new().assemble(&records).unwrap();
        assert_eq!(batch.graph_feature, None);
    }

    #[test]
    fn test_inconsistent_features_fail() {
        let missing = vec![
            with_feature(record(1, 1, &[], 0.0), &[1.0]),
            record(1, 1, &[], 0.0),
        ];
        let err = BatchAssembler::new().assemble(&missing).unwrap_err();
        assert!(matches!(err, LoaderError::InconsistentGraphFeature { position: 1, .. }));

        let ragged = vec![
            with_feature(record(1, 1, &[], 0.0), &[1.0]),
            with_feature(record(1, 1, &[], 0.0), &[1.0, 2.0]),
        ];
        assert!(BatchAssembler::new().assemble(&ragged).is_err());
    }

    #[test]
    fn test_empty_segment() {
        let records: Vec<Record> = Vec::new();
        let batch = BatchAssembler::new().assemble(&records).unwrap();
        assert_eq!(batch, AssembledBatch::default());
    }

    #[test]
    fn test_index_overflow() {
        let big = record(u32::MAX, 1, &[], 0.0);
        let small = record(1, 1, &[], 0.0);
        let err = BatchAssembler::new().assemble(&[big, small]).unwrap_err();
        assert!(matches!(err, LoaderError::IndexOverflow(_)));
    }

    #[test]
    fn test_invalid_member_is_rejected() {
        let good = record(1, 1, &[(0, 0, 1.0)], 0.0);
        let mut bad = record(1, 1, &[(0, 0, 1.0)], 1.0);
        bad.graph_map.variables[0] = u32::MAX;

        let err = BatchAssembler::new().assemble(&[good, bad]).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn test_into_parts_order() {
        let r = with_feature(record(1, 1, &[(0, 0, -1.0)], 1.0), &[7.0]);
        let (graph_map, v_map, f_map, edges, features, labels) =
            BatchAssembler::new().assemble(&[r]).unwrap().into_parts();
        assert_eq!(graph_map.edge_count(), 1);
        assert_eq!(v_map, vec![0]);
        assert_eq!(f_map, vec![0]);
        assert_eq!(edges, vec![-1.0]);
        assert_eq!(features, Some(vec![vec![7.0]]));
        assert_eq!(labels, vec![1.0]);
    }
}
