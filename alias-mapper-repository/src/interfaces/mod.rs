//! Interface definitions for the alias mapper's external collaborators.
//!
//! The pipeline only ever talks to these traits, so every backend can be
//! swapped for a mock in tests.

mod entity_source;
mod mapping_store;
mod search_node_client;

pub use entity_source::{EntitySource, RecordRegistry};
pub use mapping_store::{CheckpointStore, MappingStore};
pub use search_node_client::SearchNodeClient;
