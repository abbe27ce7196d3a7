//! Error types for the batching pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoaderError>;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Parse error at record {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Invalid record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Record index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Graph feature mismatch at segment position {position}: {reason}")]
    InconsistentGraphFeature { position: usize, reason: String },

    #[error("Combined index space exceeds u32 ({0} entries)")]
    IndexOverflow(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker pool disconnected before replying")]
    WorkerDisconnected,

    #[error("Worker panicked while loading outer batch {0}")]
    WorkerPanicked(usize),
}

impl LoaderError {
    /// Stable error code for logs and callers that match on strings
    pub fn code(&self) -> &'static str {
        match self {
            LoaderError::Parse { .. } => "PARSE_ERROR",
            LoaderError::InvalidRecord { .. } => "INVALID_RECORD",
            LoaderError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            LoaderError::Config(_) => "CONFIGURATION_ERROR",
            LoaderError::InconsistentGraphFeature { .. } => "INCONSISTENT_GRAPH_FEATURE",
            LoaderError::IndexOverflow(_) => "INDEX_OVERFLOW",
            LoaderError::WorkerDisconnected => "WORKER_DISCONNECTED",
            LoaderError::WorkerPanicked(_) => "WORKER_PANICKED",
            LoaderError::Io(_) | LoaderError::Json(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn invalid_record(index: usize, reason: impl Into<String>) -> Self {
        LoaderError::InvalidRecord {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        LoaderError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
