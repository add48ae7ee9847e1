//! Checkpointed persister.
//!
//! A group's checkpoint is written only after every one of its rows has been
//! upserted. Any store failure returns before the mark, so the group stays
//! eligible for a full rerun.

use std::sync::Arc;

use tracing::{debug, instrument};

use alias_mapper_repository::{CheckpointStore, MappingStore};
use alias_mapper_shared::{GroupId, MappingRow};

use crate::context::MappingContext;
use crate::errors::PipelineError;

/// What a persist call wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersistSummary {
    pub rows: usize,
    pub checkpointed: bool,
}

pub struct Persister {
    mappings: Arc<dyn MappingStore>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl Persister {
    pub fn new(mappings: Arc<dyn MappingStore>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            mappings,
            checkpoints,
        }
    }

    pub fn from_context(ctx: &MappingContext) -> Self {
        Self::new(ctx.mappings.clone(), ctx.checkpoints.clone())
    }

    pub async fn is_complete(&self, group_id: &GroupId) -> Result<bool, PipelineError> {
        Ok(self.checkpoints.is_group_complete(group_id).await?)
    }

    /// Upsert every row, then mark the group complete.
    ///
    /// Safe to call again for the same group: rows are upserted and the mark
    /// is a no-op the second time.
    #[instrument(skip_all, fields(group_id = %group_id, rows = rows.len()))]
    pub async fn persist(
        &self,
        group_id: &GroupId,
        rows: &[MappingRow],
    ) -> Result<PersistSummary, PipelineError> {
        self.write_rows(rows).await?;
        self.checkpoints.mark_group_complete(group_id).await?;
        debug!("Group checkpointed");

        Ok(PersistSummary {
            rows: rows.len(),
            checkpointed: true,
        })
    }

    /// Upsert rows without checkpointing, for groups that must run again.
    pub async fn persist_rows(&self, rows: &[MappingRow]) -> Result<PersistSummary, PipelineError> {
        self.write_rows(rows).await?;
        Ok(PersistSummary {
            rows: rows.len(),
            checkpointed: false,
        })
    }

    async fn write_rows(&self, rows: &[MappingRow]) -> Result<(), PipelineError> {
        if !rows.is_empty() {
            self.mappings.upsert_mappings(rows).await?;
        }
        Ok(())
    }
}
