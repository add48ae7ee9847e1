//! Postgres-backed stores.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::errors::StoreError;
use crate::interfaces::{CheckpointStore, EntitySource, MappingStore, RecordRegistry};
use crate::postgres::schema::{
    COMPLETED_GROUPS, CREATE_CHECKPOINTS, CREATE_MAPPINGS, GROUP_COMPLETE, LOAD_ALIASES,
    LOAD_ENTITIES, MARK_GROUP_COMPLETE, UPSERT_MAPPINGS, VERIFIED_RECORDS,
};
use alias_mapper_shared::{Entity, EntityId, GroupId, MappingRow, RecordId};

const DEFAULT_PERSIST_CHUNK_SIZE: usize = 1000;
const DEFAULT_VERIFICATION_CHUNK_SIZE: usize = 5000;

/// PostgreSQL store implementing every relational collaborator of the
/// pipeline over one connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    persist_chunk_size: usize,
    verification_chunk_size: usize,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            persist_chunk_size: DEFAULT_PERSIST_CHUNK_SIZE,
            verification_chunk_size: DEFAULT_VERIFICATION_CHUNK_SIZE,
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Rows per upsert statement and ids per verification lookup. Zero is
    /// treated as one.
    pub fn with_chunk_sizes(mut self, persist: usize, verification: usize) -> Self {
        self.persist_chunk_size = persist.max(1);
        self.verification_chunk_size = verification.max(1);
        self
    }

    /// Create the tables owned by the mapper if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_MAPPINGS).execute(&self.pool).await?;
        sqlx::query(CREATE_CHECKPOINTS).execute(&self.pool).await?;
        debug!("Mapping schema ready");
        Ok(())
    }
}

/// Collapse rows sharing a (record, entity) pair to the highest confidence.
///
/// A single `INSERT ... ON CONFLICT DO UPDATE` statement may not touch the
/// same key twice, so each statement must carry distinct pairs.
fn collapse_duplicates(rows: &[MappingRow]) -> Vec<MappingRow> {
    let mut best: BTreeMap<(&RecordId, &EntityId), f64> = BTreeMap::new();
    for row in rows {
        best.entry(row.key())
            .and_modify(|c| *c = c.max(row.confidence))
            .or_insert(row.confidence);
    }
    best.into_iter()
        .map(|((record_id, entity_id), confidence)| {
            MappingRow::new(record_id.clone(), entity_id.clone(), confidence)
        })
        .collect()
}

/// Column arrays bound to the `UNNEST` upsert.
fn columns(rows: &[MappingRow]) -> (Vec<String>, Vec<String>, Vec<f64>) {
    let mut record_ids = Vec::with_capacity(rows.len());
    let mut entity_ids = Vec::with_capacity(rows.len());
    let mut confidences = Vec::with_capacity(rows.len());
    for row in rows {
        record_ids.push(row.record_id.as_str().to_string());
        entity_ids.push(row.entity_id.as_str().to_string());
        confidences.push(row.confidence);
    }
    (record_ids, entity_ids, confidences)
}

#[async_trait]
impl MappingStore for PostgresStore {
    /// All chunks are written in one transaction, so a failure leaves none of
    /// the rows behind.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn upsert_mappings(&self, rows: &[MappingRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let rows = collapse_duplicates(rows);
        let mut tx = self.pool.begin().await?;

        for chunk in rows.chunks(self.persist_chunk_size) {
            let (record_ids, entity_ids, confidences) = columns(chunk);
            sqlx::query(UPSERT_MAPPINGS)
                .bind(record_ids)
                .bind(entity_ids)
                .bind(confidences)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(rows = rows.len(), "Upserted mapping rows");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PostgresStore {
    async fn is_group_complete(&self, group_id: &GroupId) -> Result<bool, StoreError> {
        let complete = sqlx::query_scalar::<_, bool>(GROUP_COMPLETE)
            .bind(group_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(complete)
    }

    async fn mark_group_complete(&self, group_id: &GroupId) -> Result<(), StoreError> {
        sqlx::query(MARK_GROUP_COMPLETE)
            .bind(group_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn completed_groups(&self) -> Result<Vec<GroupId>, StoreError> {
        let ids = sqlx::query_scalar::<_, String>(COMPLETED_GROUPS)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(GroupId::from).collect())
    }
}

#[async_trait]
impl EntitySource for PostgresStore {
    #[instrument(skip(self))]
    async fn load_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let entities = sqlx::query_as::<_, (String, Option<String>)>(LOAD_ENTITIES)
            .fetch_all(&self.pool)
            .await?;
        let aliases = sqlx::query_as::<_, (String, String)>(LOAD_ALIASES)
            .fetch_all(&self.pool)
            .await?;

        let mut by_entity = aliases_by_entity(aliases);

        let entities: Vec<Entity> = entities
            .into_iter()
            .map(|(id, name)| {
                let aliases = by_entity.remove(&id).unwrap_or_default();
                Entity {
                    id: EntityId::new(id),
                    name,
                    aliases,
                }
            })
            .collect();

        info!(entities = entities.len(), "Loaded entities from PostgreSQL");
        Ok(entities)
    }
}

#[async_trait]
impl RecordRegistry for PostgresStore {
    #[instrument(skip(self, record_ids), fields(records = record_ids.len()))]
    async fn filter_verified(&self, record_ids: &[RecordId]) -> Result<HashSet<RecordId>, StoreError> {
        let mut verified = HashSet::new();

        for chunk in record_ids.chunks(self.verification_chunk_size) {
            let ids: Vec<String> = chunk.iter().map(|id| id.as_str().to_string()).collect();
            let found = sqlx::query_scalar::<_, String>(VERIFIED_RECORDS)
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
            verified.extend(found.into_iter().map(RecordId::new));
        }

        Ok(verified)
    }
}

/// Group alias rows per entity, keeping their arrival order.
fn aliases_by_entity(rows: Vec<(String, String)>) -> HashMap<String, Vec<String>> {
    let mut by_entity: HashMap<String, Vec<String>> = HashMap::new();
    for (entity_id, alias) in rows {
        by_entity.entry(entity_id).or_default().push(alias);
    }
    by_entity
}
