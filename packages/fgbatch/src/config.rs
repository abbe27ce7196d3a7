//! Loader construction options.
//!
//! Loaded from JSON (every field except `input_source` has a default) or
//! built in code. `validate()` runs before any store is opened, so bad
//! parameters fail before the first batch.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};
use crate::partition::{DEFAULT_HIDDEN_DIM, DEFAULT_MEMORY_LIMIT};
use crate::store::DEFAULT_MAX_CACHE_SIZE;

/// Default number of logical records per outer batch.
pub const DEFAULT_OUTER_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Backing record file. Required unless a generator is supplied.
    #[serde(default)]
    pub input_source: Option<PathBuf>,
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    #[serde(default = "default_memory_limit")]
    pub memory_limit: u64,
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: u64,
    #[serde(default = "default_outer_batch_size")]
    pub outer_batch_size: usize,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub seed: u64,
    /// Worker threads; 0 runs every outer batch on the caller's thread.
    #[serde(default)]
    pub worker_count: usize,
    /// Synthetic samples per epoch in generator mode.
    #[serde(default)]
    pub epoch_size: usize,
}

fn default_max_cache_size() -> usize {
    DEFAULT_MAX_CACHE_SIZE
}

fn default_memory_limit() -> u64 {
    DEFAULT_MEMORY_LIMIT
}

fn default_hidden_dim() -> u64 {
    DEFAULT_HIDDEN_DIM
}

fn default_outer_batch_size() -> usize {
    DEFAULT_OUTER_BATCH_SIZE
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            input_source: None,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            outer_batch_size: DEFAULT_OUTER_BATCH_SIZE,
            shuffle: false,
            seed: 0,
            worker_count: 0,
            epoch_size: 0,
        }
    }
}

impl LoaderConfig {
    /// File-mode config with defaults for everything else.
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            input_source: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check parameters shared by both modes.
    pub fn validate(&self) -> Result<()> {
        if self.memory_limit == 0 {
            return Err(LoaderError::Config("memory_limit must be > 0".into()));
        }
        if self.hidden_dim == 0 {
            return Err(LoaderError::Config("hidden_dim must be > 0".into()));
        }
        if self.outer_batch_size == 0 {
            return Err(LoaderError::Config("outer_batch_size must be > 0".into()));
        }
        Ok(())
    }

    /// `validate()` plus the file-mode requirement of an input source.
    pub fn validate_file_mode(&self) -> Result<&Path> {
        self.validate()?;
        self.input_source
            .as_deref()
            .ok_or_else(|| LoaderError::Config("input_source is required without a generator".into()))
    }
}
