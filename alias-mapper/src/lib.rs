//! # Alias Mapper
//!
//! Entry point library for the alias mapper.
//!
//! This crate reads the environment configuration, wires the search cluster
//! and stores into the mapping pipeline, and defines the process-level error.

pub mod config;

pub use config::{Dependencies, LogFormat, Settings};

use thiserror::Error;

/// Errors that can occur during mapper startup or execution.
#[derive(Error, Debug)]
pub enum MapperError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] alias_mapper_pipeline::PipelineError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] alias_mapper_repository::SearchError),

    /// Store error.
    #[error("Store error: {0}")]
    StoreError(#[from] alias_mapper_repository::StoreError),
}

impl MapperError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
