//! Dependency initialization and wiring for the alias mapper.

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::MapperError;
use alias_mapper_pipeline::{EndpointPool, MappingContext, Orchestrator};
use alias_mapper_repository::file::{FileCheckpointStore, JsonLinesEntitySource};
use alias_mapper_repository::memory::{InMemoryCheckpointStore, InMemoryMappingStore};
use alias_mapper_repository::{
    CheckpointStore, EntitySource, MappingStore, OpenSearchNodeClient, PostgresStore,
    RecordRegistry,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Feed of the entities to map.
    pub entities: Arc<dyn EntitySource>,
}

impl Dependencies {
    /// Connect every collaborator named by `settings`.
    ///
    /// PostgreSQL is only contacted when some store needs it. In a dry run
    /// mappings and checkpoints are kept in memory.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(MapperError)` - If a connection or the configuration fails
    pub async fn new(settings: &Settings) -> Result<Self, MapperError> {
        info!(
            endpoints = settings.endpoints.len(),
            index = %settings.pipeline.batcher.corpus.index,
            field = %settings.pipeline.batcher.corpus.field,
            dry_run = settings.dry_run,
            "Initializing dependencies"
        );

        let search = OpenSearchNodeClient::new(&settings.endpoints, settings.opensearch.clone())?;
        let pool = EndpointPool::new(settings.endpoints.clone())?;

        let needs_database = !settings.dry_run
            || settings.entities_file.is_none()
            || settings.verify_records;
        let database = if needs_database {
            let store = PostgresStore::connect(&settings.database_url, settings.database_max_connections)
                .await?
                .with_chunk_sizes(settings.persist_chunk_size, settings.verification_chunk_size);
            if !settings.dry_run {
                store.ensure_schema().await?;
            }
            Some(Arc::new(store))
        } else {
            None
        };
        let postgres = || {
            database
                .clone()
                .ok_or_else(|| MapperError::config("PostgreSQL store required but not connected"))
        };

        let entities: Arc<dyn EntitySource> = match &settings.entities_file {
            Some(path) => Arc::new(JsonLinesEntitySource::new(path)),
            None => postgres()?,
        };

        let mappings: Arc<dyn MappingStore>;
        let checkpoints: Arc<dyn CheckpointStore>;
        if settings.dry_run {
            info!("Dry run: mappings and checkpoints are kept in memory");
            mappings = Arc::new(InMemoryMappingStore::new());
            checkpoints = Arc::new(InMemoryCheckpointStore::new());
        } else {
            mappings = postgres()?;
            checkpoints = match &settings.checkpoint_file {
                Some(path) => Arc::new(FileCheckpointStore::open(path).await?),
                None => postgres()?,
            };
        }

        let mut ctx = MappingContext::new(
            pool,
            Arc::new(search),
            mappings,
            checkpoints,
            settings.pipeline.clone(),
        );
        if settings.verify_records {
            let registry: Arc<dyn RecordRegistry> = postgres()?;
            ctx = ctx.with_record_registry(registry);
        }

        let orchestrator = Orchestrator::new(ctx)?;
        info!("Dependencies ready");

        Ok(Self {
            orchestrator,
            entities,
        })
    }
}
