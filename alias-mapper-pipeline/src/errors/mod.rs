//! Error types for the mapping pipeline.

use alias_mapper_repository::{SearchError, StoreError};
use thiserror::Error;

/// Errors that can occur in the mapping pipeline.
///
/// Per-query failures never surface here: the dispatcher retries or records
/// them. These are group-level and startup-level failures.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from the search cluster.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),

    /// Error from the relational or checkpoint store.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
