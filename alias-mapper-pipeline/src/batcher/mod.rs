//! Clause batcher.
//!
//! Partitions an entity's search terms into consecutive batches of at most
//! `batch_size` and turns every batch into one disjunctive query. The
//! partition is deterministic and uses every term exactly once.

pub mod variations;

use alias_mapper_shared::{AliasBatch, ClauseQuery, Entity};

use crate::config::BatcherConfig;
use crate::errors::PipelineError;

#[derive(Debug, Clone)]
pub struct ClauseBatcher {
    config: BatcherConfig,
}

impl ClauseBatcher {
    /// # Returns
    ///
    /// * `Err(PipelineError::ConfigError)` - If `batch_size` is zero
    pub fn new(config: BatcherConfig) -> Result<Self, PipelineError> {
        if config.batch_size == 0 {
            return Err(PipelineError::config("batch size must be at least 1"));
        }
        Ok(Self { config })
    }

    /// The terms searched for `entity`, before batching.
    pub fn terms(&self, entity: &Entity) -> Vec<String> {
        let terms = entity.search_terms();
        if self.config.expand_variations {
            variations::expand(&terms)
        } else {
            terms
        }
    }

    /// Split the entity's terms into batches.
    ///
    /// An entity with fewer terms than the batch size yields one batch; an
    /// entity without terms yields none.
    pub fn batch(&self, entity: &Entity) -> Vec<AliasBatch> {
        self.terms(entity)
            .chunks(self.config.batch_size)
            .enumerate()
            .map(|(index, chunk)| AliasBatch {
                entity_id: entity.id.clone(),
                index,
                aliases: chunk.to_vec(),
            })
            .collect()
    }

    /// Build the query for one batch.
    ///
    /// The minimum-should-match threshold is clamped to the batch length so
    /// a short trailing batch can still match.
    pub fn build_query(&self, batch: &AliasBatch) -> ClauseQuery {
        ClauseQuery {
            entity_id: batch.entity_id.clone(),
            batch_index: batch.index,
            corpus: self.config.corpus.clone(),
            clauses: batch.aliases.clone(),
            min_should_match: self.config.min_should_match.clamp(1, batch.len().max(1)),
        }
    }

    /// Batch the entity and build every query.
    pub fn queries(&self, entity: &Entity) -> Vec<ClauseQuery> {
        self.batch(entity)
            .iter()
            .map(|batch| self.build_query(batch))
            .collect()
    }
}
