//! Orchestrator: drives entity groups through the pipeline.
//!
//! Coordinates the batcher, dispatcher, verifier and persister for many
//! groups at once, skipping groups an earlier run already checkpointed.

mod report;

pub use report::{GroupOutcome, GroupReport, RunReport};

use std::future::Future;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use alias_mapper_shared::{Entity, MappingRow, RecordId};

use crate::batcher::ClauseBatcher;
use crate::config::CompletionPolicy;
use crate::context::MappingContext;
use crate::dispatcher::Dispatcher;
use crate::errors::PipelineError;
use crate::persister::Persister;
use crate::verifier::Verifier;

pub struct Orchestrator {
    ctx: MappingContext,
    batcher: ClauseBatcher,
    dispatcher: Dispatcher,
    verifier: Verifier,
    persister: Persister,
}

impl Orchestrator {
    /// Build the pipeline stages from the context.
    ///
    /// # Returns
    ///
    /// * `Err(PipelineError::ConfigError)` - If the configuration is invalid
    pub fn new(ctx: MappingContext) -> Result<Self, PipelineError> {
        ctx.config.validate()?;

        Ok(Self {
            batcher: ClauseBatcher::new(ctx.config.batcher.clone())?,
            dispatcher: Dispatcher::new(&ctx),
            verifier: Verifier::new(ctx.config.acceptance.clone()),
            persister: Persister::from_context(&ctx),
            ctx,
        })
    }

    /// Process every entity until the feed is exhausted.
    pub async fn run(&self, entities: Vec<Entity>) -> RunReport {
        self.run_until(entities, std::future::pending()).await
    }

    /// Process entities until the feed is exhausted or `shutdown` resolves.
    ///
    /// On shutdown, groups still in flight are dropped before their
    /// checkpoint and will be processed again by the next run.
    #[instrument(skip_all, fields(groups = entities.len()))]
    pub async fn run_until<F>(&self, entities: Vec<Entity>, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let workers = self.ctx.config.group_workers;
        info!(workers, "Starting alias mapping run");

        let mut groups = stream::iter(entities)
            .map(|entity| self.process_group(entity))
            .buffer_unordered(workers);
        let mut shutdown = std::pin::pin!(shutdown);
        let mut report = RunReport::default();

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    warn!(finished = report.groups.len(), "Shutdown requested, abandoning groups in flight");
                    report.interrupted = true;
                    break;
                }
                next = groups.next() => match next {
                    Some(group) => report.groups.push(group),
                    None => break,
                },
            }
        }

        info!(
            completed = report.completed(),
            skipped = report.skipped(),
            incomplete = report.incomplete(),
            failed = report.failed(),
            persisted_rows = report.persisted_rows(),
            success_ratio = report.success_ratio(),
            interrupted = report.interrupted,
            "Alias mapping run finished"
        );
        report
    }

    /// Run one group end to end. Never fails: errors land in the report.
    #[instrument(skip_all, fields(group_id = %entity.id))]
    pub async fn process_group(&self, entity: Entity) -> GroupReport {
        let started = Instant::now();
        let mut report = GroupReport::new(entity.id.clone());

        if let Err(e) = self.try_process_group(&entity, &mut report).await {
            error!(error = %e, "Group failed, leaving it for the next run");
            report.outcome = GroupOutcome::Failed;
            report.error = Some(e.to_string());
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        if report.outcome != GroupOutcome::Skipped {
            info!(
                outcome = ?report.outcome,
                batches = report.batches_total,
                batches_failed = report.batches_failed,
                raw_hits = report.raw_hits,
                verified_rows = report.verified_rows,
                persisted_rows = report.persisted_rows,
                elapsed_ms = report.elapsed_ms,
                "Group processed"
            );
        }
        report
    }

    async fn try_process_group(
        &self,
        entity: &Entity,
        report: &mut GroupReport,
    ) -> Result<(), PipelineError> {
        if self.persister.is_complete(&entity.id).await? {
            debug!("Group already checkpointed, skipping");
            report.outcome = GroupOutcome::Skipped;
            return Ok(());
        }

        let queries = self.batcher.queries(entity);
        report.batches_total = queries.len();

        let outcome = self.dispatcher.dispatch(queries).await;
        report.batches_succeeded = outcome.succeeded();
        report.batches_failed = outcome.failed();
        report.raw_hits = outcome.hits.len();

        let rows = self.verifier.verify(&outcome.hits);
        let rows = self.filter_verified_records(rows).await?;
        report.verified_rows = rows.len();

        let checkpoint =
            outcome.is_complete() || self.ctx.config.completion == CompletionPolicy::AllowPartial;
        let summary = if checkpoint {
            self.persister.persist(&entity.id, &rows).await?
        } else {
            warn!(
                batches_failed = report.batches_failed,
                "Batches failed, persisting rows without checkpoint"
            );
            self.persister.persist_rows(&rows).await?
        };

        report.persisted_rows = summary.rows;
        report.outcome = if summary.checkpointed {
            GroupOutcome::Completed
        } else {
            GroupOutcome::Incomplete
        };
        Ok(())
    }

    /// Keep only rows whose record is known and verified, when a registry is
    /// configured.
    async fn filter_verified_records(
        &self,
        rows: Vec<MappingRow>,
    ) -> Result<Vec<MappingRow>, PipelineError> {
        let Some(registry) = &self.ctx.records else {
            return Ok(rows);
        };
        if rows.is_empty() {
            return Ok(rows);
        }

        let ids: Vec<RecordId> = rows.iter().map(|row| row.record_id.clone()).collect();
        let verified = registry.filter_verified(&ids).await?;
        let before = rows.len();
        let rows: Vec<MappingRow> = rows
            .into_iter()
            .filter(|row| verified.contains(&row.record_id))
            .collect();

        debug!(dropped = before - rows.len(), "Filtered unverified records");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use alias_mapper_repository::memory::InMemoryCheckpointStore;
    use alias_mapper_repository::CheckpointStore;
    use alias_mapper_shared::{GroupId, MappingRow};

    use crate::config::{PipelineConfig, RetryPolicy};
    use crate::endpoint_pool::EndpointPool;
    use crate::test_support::{
        endpoint, harness, harness_with_checkpoints, FlakyMappingStore, MockSearchCluster,
        StaticRegistry,
    };

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.batcher.expand_variations = false;
        config.dispatch.page_size = 10;
        config.dispatch.retry = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        };
        config
    }

    fn acme_college() -> Entity {
        Entity::new("acme-college").with_aliases((0..120).map(|i| format!("acme college {}", i)))
    }

    fn hit(record: &str, score: f64) -> Vec<(String, f64)> {
        vec![(record.to_string(), score)]
    }

    #[tokio::test]
    async fn test_overlapping_batches_yield_one_row() {
        let cluster = Arc::new(
            MockSearchCluster::new()
                .with_matches("acme college 3", hit("R1", 1.5))
                .with_matches("acme college 70", hit("R1", 4.0))
                .with_matches("acme college 119", hit("R1", 2.0)),
        );
        let h = harness(cluster.clone(), &[9501, 9502, 9503], config());
        let orchestrator = Orchestrator::new(h.ctx.clone()).unwrap();

        let report = orchestrator.run(vec![acme_college()]).await;

        assert_eq!(report.completed(), 1);
        let group = &report.groups[0];
        assert_eq!(group.batches_total, 3);
        assert_eq!(group.raw_hits, 3);
        assert_eq!(group.persisted_rows, 1);
        assert_eq!(cluster.search_calls(), 3);
        assert_eq!(h.mappings.rows(), vec![MappingRow::new("R1", "acme-college", 4.0)]);
        assert!(h.checkpoints.checkpoint(&GroupId::from("acme-college")).is_some());
    }

    #[tokio::test]
    async fn test_checkpointed_groups_are_skipped() {
        let cluster = Arc::new(MockSearchCluster::new().with_matches("acme college 0", hit("R1", 1.0)));
        let checkpoints = Arc::new(InMemoryCheckpointStore::with_completed([GroupId::from(
            "acme-college",
        )]));
        let h = harness_with_checkpoints(cluster.clone(), &[9501], config(), checkpoints);
        let orchestrator = Orchestrator::new(h.ctx.clone()).unwrap();

        let report = orchestrator
            .run(vec![acme_college(), Entity::new("globex").with_aliases(["globex"])])
            .await;

        assert_eq!(report.skipped(), 1);
        assert_eq!(report.completed(), 1);
        assert_eq!(report.attempted(), 1);
        assert_eq!(cluster.search_calls(), 1);
        assert!(h.mappings.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_policy_leaves_partial_group_open() {
        let cluster = Arc::new(
            MockSearchCluster::new()
                .with_matches("acme college 3", hit("R1", 1.0))
                .with_matches("acme college 70", hit("R2", 1.0))
                .with_failing_alias("acme college 70"),
        );
        let h = harness(cluster, &[9501, 9502], config());
        let orchestrator = Orchestrator::new(h.ctx.clone()).unwrap();

        let report = orchestrator.run(vec![acme_college()]).await;

        let group = &report.groups[0];
        assert_eq!(group.outcome, GroupOutcome::Incomplete);
        assert_eq!(group.batches_failed, 1);
        assert_eq!(group.batches_succeeded, 2);
        assert_eq!(h.mappings.rows(), vec![MappingRow::new("R1", "acme-college", 1.0)]);
        assert!(!h
            .checkpoints
            .is_group_complete(&GroupId::from("acme-college"))
            .await
            .unwrap());
        assert!(!report.meets(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_policy_checkpoints_with_failed_batches() {
        let cluster = Arc::new(
            MockSearchCluster::new()
                .with_matches("acme college 3", hit("R1", 1.0))
                .with_failing_alias("acme college 70"),
        );
        let mut config = config();
        config.completion = CompletionPolicy::AllowPartial;
        let h = harness(cluster, &[9501, 9502], config);
        let orchestrator = Orchestrator::new(h.ctx.clone()).unwrap();

        let report = orchestrator.run(vec![acme_college()]).await;

        assert_eq!(report.completed(), 1);
        assert_eq!(report.groups[0].batches_failed, 1);
        assert!(h.checkpoints.checkpoint(&GroupId::from("acme-college")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_completes_when_a_node_is_down() {
        let cluster = Arc::new(
            MockSearchCluster::new()
                .with_matches("acme college 3", hit("R1", 1.0))
                .with_matches("acme college 70", hit("R2", 2.0))
                .with_down(endpoint(9501)),
        );
        let h = harness(cluster, &[9501, 9502], config());
        let orchestrator = Orchestrator::new(h.ctx.clone()).unwrap();

        let report = orchestrator.run(vec![acme_college()]).await;

        assert_eq!(report.completed(), 1);
        assert_eq!(h.mappings.len(), 2);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_retried_next_run() {
        let cluster = Arc::new(MockSearchCluster::new().with_matches("acme college 3", hit("R1", 1.0)));
        let mappings = Arc::new(FlakyMappingStore::failing(1));
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let ctx = MappingContext::new(
            EndpointPool::new(vec![endpoint(9501)]).unwrap(),
            cluster,
            mappings.clone(),
            checkpoints.clone(),
            config(),
        );
        let orchestrator = Orchestrator::new(ctx).unwrap();

        let first = orchestrator.run(vec![acme_college()]).await;
        assert_eq!(first.failed(), 1);
        assert!(first.groups[0].error.is_some());
        assert!(checkpoints.completed_groups().await.unwrap().is_empty());

        let second = orchestrator.run(vec![acme_college()]).await;
        assert_eq!(second.completed(), 1);
        assert_eq!(mappings.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_unverified_records_are_not_persisted() {
        let cluster = Arc::new(
            MockSearchCluster::new()
                .with_matches("acme college 3", hit("R1", 1.0))
                .with_matches("acme college 4", hit("R2", 1.0)),
        );
        let h = harness(cluster, &[9501], config());
        let ctx = h.ctx.clone().with_record_registry(Arc::new(StaticRegistry::of(&["R2"])));
        let orchestrator = Orchestrator::new(ctx).unwrap();

        let report = orchestrator.run(vec![acme_college()]).await;

        assert_eq!(report.groups[0].verified_rows, 1);
        assert_eq!(h.mappings.rows(), vec![MappingRow::new("R2", "acme-college", 1.0)]);
    }

    #[tokio::test]
    async fn test_entity_without_terms_completes_empty() {
        let h = harness(Arc::new(MockSearchCluster::new()), &[9501], config());
        let orchestrator = Orchestrator::new(h.ctx.clone()).unwrap();

        let report = orchestrator.run(vec![Entity::new("nameless")]).await;

        assert_eq!(report.completed(), 1);
        assert_eq!(report.groups[0].batches_total, 0);
        assert!(h.checkpoints.checkpoint(&GroupId::from("nameless")).is_some());
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_checkpointing() {
        let h = harness(Arc::new(MockSearchCluster::new()), &[9501], config());
        let orchestrator = Orchestrator::new(h.ctx.clone()).unwrap();

        let report = orchestrator
            .run_until(vec![acme_college()], std::future::ready(()))
            .await;

        assert!(report.interrupted);
        assert!(report.groups.is_empty());
        assert!(h.checkpoints.completed_groups().await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = config();
        config.group_workers = 0;
        let h = harness(Arc::new(MockSearchCluster::new()), &[9501], PipelineConfig::default());
        let ctx = MappingContext {
            config: Arc::new(config),
            ..h.ctx
        };

        assert!(matches!(
            Orchestrator::new(ctx),
            Err(PipelineError::ConfigError(_))
        ));
    }
}
