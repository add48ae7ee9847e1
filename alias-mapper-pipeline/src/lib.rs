//! # Alias Mapper Pipeline
//!
//! This crate provides the group-mapping dispatch pipeline that maps free-text
//! records to entities through a sharded search cluster.
//!
//! ## Architecture
//!
//! Each entity is one checkpoint group and flows through:
//!
//! 1. **Clause Batcher**: Splits the entity's aliases into bounded disjunctive queries
//! 2. **Dispatcher**: Runs the queries concurrently on randomly picked nodes, scrolling every result page
//! 3. **Verifier**: Drops weak matches and deduplicates (record, entity) pairs
//! 4. **Persister**: Upserts mapping rows, then checkpoints the group
//! 5. **Orchestrator**: Skips checkpointed groups and drives many groups at once

pub mod batcher;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod endpoint_pool;
pub mod errors;
pub mod orchestrator;
pub mod persister;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    AcceptanceRule, BatcherConfig, CompletionPolicy, DispatchConfig, PipelineConfig, RetryPolicy,
};
pub use context::MappingContext;
pub use endpoint_pool::EndpointPool;
pub use errors::PipelineError;
pub use orchestrator::{GroupOutcome, GroupReport, Orchestrator, RunReport};
