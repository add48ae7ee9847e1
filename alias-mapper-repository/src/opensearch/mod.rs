//! OpenSearch implementation of the search node client.
//!
//! This module provides a concrete implementation of `SearchNodeClient`
//! using OpenSearch as the backend.

mod client;
mod queries;

pub use client::{OpenSearchConfig, OpenSearchNodeClient};
pub use queries::{build_clause_query, parse_hit_page};
