//! Entity feed and record registry traits.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::StoreError;
use alias_mapper_shared::{Entity, RecordId};

/// Read-only feed of the entities to map, loaded once before processing.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn load_entities(&self) -> Result<Vec<Entity>, StoreError>;
}

/// Lookup of which records exist and are eligible for mapping.
#[async_trait]
pub trait RecordRegistry: Send + Sync {
    /// Return the subset of `record_ids` that are known and verified.
    async fn filter_verified(&self, record_ids: &[RecordId]) -> Result<HashSet<RecordId>, StoreError>;
}
