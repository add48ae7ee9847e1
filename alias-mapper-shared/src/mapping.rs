//! Persisted mapping rows and group checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, GroupId, RecordId};

/// A verified (record, entity) match. At most one row exists per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    pub record_id: RecordId,
    pub entity_id: EntityId,
    pub confidence: f64,
}

impl MappingRow {
    pub fn new(record_id: impl Into<RecordId>, entity_id: impl Into<EntityId>, confidence: f64) -> Self {
        Self {
            record_id: record_id.into(),
            entity_id: entity_id.into(),
            confidence,
        }
    }

    /// The uniqueness key of the row.
    pub fn key(&self) -> (&RecordId, &EntityId) {
        (&self.record_id, &self.entity_id)
    }
}

/// Durable marker that every row of a group has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCheckpoint {
    pub group_id: GroupId,
    pub completed_at: DateTime<Utc>,
}

impl GroupCheckpoint {
    pub fn now(group_id: GroupId) -> Self {
        Self {
            group_id,
            completed_at: Utc::now(),
        }
    }
}
