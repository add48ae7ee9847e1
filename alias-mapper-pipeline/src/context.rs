//! Shared state handed to every worker.

use std::sync::Arc;

use tokio::sync::Semaphore;

use alias_mapper_repository::{CheckpointStore, MappingStore, RecordRegistry, SearchNodeClient};

use crate::config::PipelineConfig;
use crate::endpoint_pool::EndpointPool;

/// Everything a group worker needs, passed explicitly instead of living in
/// globals. Cloning is cheap: every field is reference counted.
#[derive(Clone)]
pub struct MappingContext {
    pub endpoints: Arc<EndpointPool>,
    pub search: Arc<dyn SearchNodeClient>,
    pub mappings: Arc<dyn MappingStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Optional filter restricting mappings to verified records.
    pub records: Option<Arc<dyn RecordRegistry>>,
    pub config: Arc<PipelineConfig>,
    /// Bounds query units in flight across every group.
    pub query_permits: Arc<Semaphore>,
}

impl MappingContext {
    pub fn new(
        endpoints: EndpointPool,
        search: Arc<dyn SearchNodeClient>,
        mappings: Arc<dyn MappingStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: PipelineConfig,
    ) -> Self {
        let permits = config.dispatch.max_concurrent_queries;
        Self {
            endpoints: Arc::new(endpoints),
            search,
            mappings,
            checkpoints,
            records: None,
            config: Arc::new(config),
            query_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Filter mappings through `registry` before persisting.
    pub fn with_record_registry(mut self, registry: Arc<dyn RecordRegistry>) -> Self {
        self.records = Some(registry);
        self
    }
}
