//! # Alias Mapper Repository
//!
//! This crate provides the traits the mapping pipeline uses to talk to its
//! external collaborators (the search cluster, the relational store, the
//! checkpoint store and the entity feed), together with concrete
//! implementations for OpenSearch, PostgreSQL, plain files and memory.

pub mod errors;
pub mod file;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod types;

pub use errors::{SearchError, StoreError};
pub use interfaces::{CheckpointStore, EntitySource, MappingStore, RecordRegistry, SearchNodeClient};
pub use opensearch::{OpenSearchConfig, OpenSearchNodeClient};
pub use postgres::PostgresStore;
pub use types::Endpoint;
