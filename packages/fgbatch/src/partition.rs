//! Memory-bounded dynamic batch partitioning.
//!
//! Splits one outer batch of records into segments whose worst-case working
//! set, estimated as `segment_size * max_edge_count * hidden_dim`, stays
//! within `limit`. Greedy, not optimal:
//!
//! 1. If the whole batch fits, return it as one segment in original order.
//! 2. Otherwise stably sort positions by edge count (descending) and walk
//!    the sorted list. At each step the record under the cursor has the
//!    largest edge count of what remains, so `limit / (edges * hidden_dim)`
//!    records can be taken safely. At least one record is always taken, so
//!    a record whose own estimate exceeds `limit` becomes a singleton
//!    segment instead of stalling the walk.

use crate::error::{LoaderError, Result};
use crate::record::Record;

/// Default partitioner budget.
pub const DEFAULT_MEMORY_LIMIT: u64 = 4_000_000;

/// Default per-edge working-set factor.
pub const DEFAULT_HIDDEN_DIM: u64 = 150;

/// Ordered positions (into the outer batch) that are assembled together.
pub type Segment = Vec<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPartitioner {
    limit: u64,
    hidden_dim: u64,
}

impl BatchPartitioner {
    /// Both `limit` and `hidden_dim` must be positive.
    pub fn new(limit: u64, hidden_dim: u64) -> Result<Self> {
        if limit == 0 {
            return Err(LoaderError::Config("memory_limit must be > 0".into()));
        }
        if hidden_dim == 0 {
            return Err(LoaderError::Config("hidden_dim must be > 0".into()));
        }
        Ok(Self { limit, hidden_dim })
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn hidden_dim(&self) -> u64 {
        self.hidden_dim
    }

    /// Worst-case memory estimate for `size` records of at most
    /// `max_edges` edges each.
    pub fn estimate(&self, size: usize, max_edges: usize) -> u128 {
        (size as u128)
            .saturating_mul(max_edges as u128)
            .saturating_mul(u128::from(self.hidden_dim))
    }

    pub fn partition<R>(&self, records: &[R]) -> Vec<Segment>
    where
        R: AsRef<Record>,
    {
        let edge_counts: Vec<usize> = records.iter().map(|r| r.as_ref().edge_count()).collect();
        self.partition_edge_counts(&edge_counts)
    }

    /// Partition by edge counts alone. Every position in
    /// `0..edge_counts.len()` appears in exactly one returned segment.
    pub fn partition_edge_counts(&self, edge_counts: &[usize]) -> Vec<Segment> {
        let n = edge_counts.len();
        if n == 0 {
            return Vec::new();
        }

        let max_edges = edge_counts.iter().copied().max().unwrap_or(0);
        if self.estimate(n, max_edges) <= u128::from(self.limit) {
            return vec![(0..n).collect()];
        }

        // sort_by_key is stable: equal edge counts keep batch order.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&pos| std::cmp::Reverse(edge_counts[pos]));

        let mut segments = Vec::new();
        let mut i = 0;
        while i < n {
            let take = self.allowed(edge_counts[order[i]]).clamp(1, n - i);
            if take == 1 && self.estimate(1, edge_counts[order[i]]) > u128::from(self.limit) {
                tracing::warn!(
                    position = order[i],
                    edges = edge_counts[order[i]],
                    limit = self.limit,
                    "record exceeds memory limit on its own; emitting singleton segment"
                );
            }
            segments.push(order[i..i + take].to_vec());
            i += take;
        }

        tracing::debug!(
            records = n,
            segments = segments.len(),
            max_edges,
            "partitioned outer batch"
        );
        segments
    }

    /// How many records with `edges` edges fit under the limit. Zero-edge
    /// records cost nothing, so everything fits.
    fn allowed(&self, edges: usize) -> usize {
        let per_record = (edges as u128).saturating_mul(u128::from(self.hidden_dim));
        if per_record == 0 {
            return usize::MAX;
        }
        usize::try_from(u128::from(self.limit) / per_record).unwrap_or(usize::MAX)
    }
}

impl Default for BatchPartitioner {
    fn default() -> Self {
        Self {
            limit: DEFAULT_MEMORY_LIMIT,
            hidden_dim: DEFAULT_HIDDEN_DIM,
        }
    }
}
