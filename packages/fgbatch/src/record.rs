//! Factor-graph record types.
//!
//! A record is one bipartite problem instance: `variable_num` variables and
//! `function_num` functions (constraints) joined by signed edges. Records are
//! immutable once built and are shared as `Arc<Record>` between the cache and
//! its readers.

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};

/// Two-row edge incidence map: `variables[k]` and `functions[k]` are the
/// zero-based endpoints of edge `k`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMap {
    pub variables: Vec<u32>,
    pub functions: Vec<u32>,
}

impl GraphMap {
    pub fn new(variables: Vec<u32>, functions: Vec<u32>) -> Self {
        debug_assert_eq!(variables.len(), functions.len());
        Self {
            variables,
            functions,
        }
    }

    pub fn with_capacity(edges: usize) -> Self {
        Self {
            variables: Vec::with_capacity(edges),
            functions: Vec::with_capacity(edges),
        }
    }

    /// Number of edges (columns of the 2xE map).
    pub fn edge_count(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate `(variable, function)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.variables.iter().copied().zip(self.functions.iter().copied())
    }
}

/// One parsed factor graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub variable_num: u32,
    pub function_num: u32,
    pub graph_map: GraphMap,
    /// Edge signs, +1.0 or -1.0, one per edge.
    pub edge_feature: Vec<f32>,
    pub graph_feature: Option<Vec<f32>>,
    pub label: f32,
}

impl Record {
    pub fn edge_count(&self) -> usize {
        self.graph_map.edge_count()
    }

    /// Check the shape every consumer relies on: both incidence rows and
    /// `edge_feature` have one entry per edge, every endpoint is below its
    /// count, and every edge sign is +1 or -1. `index` only labels the error.
    pub fn validate(&self, index: usize) -> Result<()> {
        let edges = self.edge_count();
        if self.graph_map.functions.len() != edges {
            return Err(LoaderError::invalid_record(
                index,
                format!(
                    "graph_map rows differ: {} variables vs {} functions",
                    edges,
                    self.graph_map.functions.len()
                ),
            ));
        }
        if self.edge_feature.len() != edges {
            return Err(LoaderError::invalid_record(
                index,
                format!("edge_feature has {} entries for {edges} edges", self.edge_feature.len()),
            ));
        }
        for (edge, (variable, function)) in self.graph_map.pairs().enumerate() {
            if variable >= self.variable_num {
                return Err(LoaderError::invalid_record(
                    index,
                    format!("edge {edge}: variable index {variable} out of range (count {})", self.variable_num),
                ));
            }
            if function >= self.function_num {
                return Err(LoaderError::invalid_record(
                    index,
                    format!("edge {edge}: function index {function} out of range (count {})", self.function_num),
                ));
            }
        }
        if let Some(edge) = self.edge_feature.iter().position(|&s| s != 1.0 && s != -1.0) {
            return Err(LoaderError::invalid_record(
                index,
                format!("edge {edge}: sign {} is not +1 or -1", self.edge_feature[edge]),
            ));
        }
        Ok(())
    }
}

impl AsRef<Record> for Record {
    fn as_ref(&self) -> &Record {
        self
    }
}
