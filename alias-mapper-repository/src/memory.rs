//! In-memory stores.
//!
//! Used by dry runs, where nothing may be written, and by tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::interfaces::{CheckpointStore, MappingStore};
use alias_mapper_shared::{EntityId, GroupCheckpoint, GroupId, MappingRow, RecordId};

/// Mapping store keyed by (record, entity), keeping the highest confidence.
#[derive(Default)]
pub struct InMemoryMappingStore {
    rows: Mutex<BTreeMap<(RecordId, EntityId), f64>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored rows ordered by record id then entity id.
    pub fn rows(&self) -> Vec<MappingRow> {
        self.rows
            .lock()
            .map(|rows| {
                rows.iter()
                    .map(|((record_id, entity_id), confidence)| {
                        MappingRow::new(record_id.clone(), entity_id.clone(), *confidence)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn upsert_mappings(&self, rows: &[MappingRow]) -> Result<(), StoreError> {
        let mut stored = self
            .rows
            .lock()
            .map_err(|_| StoreError::query("mapping rows poisoned"))?;
        for row in rows {
            stored
                .entry((row.record_id.clone(), row.entity_id.clone()))
                .and_modify(|c| *c = c.max(row.confidence))
                .or_insert(row.confidence);
        }
        Ok(())
    }
}

/// Checkpoint store that keeps the first completion time of each group.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Mutex<HashMap<GroupId, GroupCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate completed groups, as left behind by an earlier run.
    pub fn with_completed<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = GroupId>,
    {
        let checkpoints = groups
            .into_iter()
            .map(|id| (id.clone(), GroupCheckpoint::now(id)))
            .collect();
        Self {
            checkpoints: Mutex::new(checkpoints),
        }
    }

    pub fn checkpoint(&self, group_id: &GroupId) -> Option<GroupCheckpoint> {
        self.checkpoints
            .lock()
            .ok()
            .and_then(|checkpoints| checkpoints.get(group_id).cloned())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn is_group_complete(&self, group_id: &GroupId) -> Result<bool, StoreError> {
        self.checkpoints
            .lock()
            .map(|checkpoints| checkpoints.contains_key(group_id))
            .map_err(|_| StoreError::query("checkpoints poisoned"))
    }

    async fn mark_group_complete(&self, group_id: &GroupId) -> Result<(), StoreError> {
        self.checkpoints
            .lock()
            .map_err(|_| StoreError::query("checkpoints poisoned"))?
            .entry(group_id.clone())
            .or_insert_with(|| GroupCheckpoint::now(group_id.clone()));
        Ok(())
    }

    async fn completed_groups(&self) -> Result<Vec<GroupId>, StoreError> {
        let mut groups: Vec<GroupId> = self
            .checkpoints
            .lock()
            .map_err(|_| StoreError::query("checkpoints poisoned"))?
            .keys()
            .cloned()
            .collect();
        groups.sort();
        Ok(groups)
    }
}
