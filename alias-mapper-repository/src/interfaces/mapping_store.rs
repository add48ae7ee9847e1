//! Mapping and checkpoint store traits.

use async_trait::async_trait;

use crate::errors::StoreError;
use alias_mapper_shared::{GroupId, MappingRow};

/// Destination for verified mapping rows.
///
/// Writes must be idempotent: upserting a row whose (record, entity) pair is
/// already stored never creates a second row. Concurrent callers from
/// different groups rely on this instead of locking.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Insert or update every row, keeping the highest confidence per pair.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Once every row is durably written
    /// * `Err(StoreError)` - If any write fails; no guarantee is made about
    ///   which rows were written
    async fn upsert_mappings(&self, rows: &[MappingRow]) -> Result<(), StoreError>;
}

/// Durable record of which groups have been fully persisted.
///
/// This is the only source of truth for resuming an interrupted run.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Whether the group was already marked complete.
    async fn is_group_complete(&self, group_id: &GroupId) -> Result<bool, StoreError>;

    /// Mark the group complete. Marking an already complete group is a no-op.
    async fn mark_group_complete(&self, group_id: &GroupId) -> Result<(), StoreError>;

    /// Every group marked complete so far.
    async fn completed_groups(&self) -> Result<Vec<GroupId>, StoreError>;
}
