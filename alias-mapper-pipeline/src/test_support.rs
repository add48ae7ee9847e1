//! Mock collaborators shared by the pipeline's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use alias_mapper_repository::memory::{InMemoryCheckpointStore, InMemoryMappingStore};
use alias_mapper_repository::{
    Endpoint, MappingStore, RecordRegistry, SearchError, SearchNodeClient, StoreError,
};
use alias_mapper_shared::{ClauseQuery, EntityId, Hit, HitPage, MappingRow, RecordId, ScrollState};

use crate::config::PipelineConfig;
use crate::context::MappingContext;
use crate::endpoint_pool::EndpointPool;

pub(crate) fn endpoint(port: u16) -> Endpoint {
    Endpoint::parse(&format!("http://localhost:{}", port)).unwrap()
}

#[derive(Default)]
struct ClusterState {
    scrolls: HashMap<String, OpenScroll>,
    next_token: u64,
    search_calls: usize,
    calls: HashMap<Endpoint, usize>,
    cleared: usize,
    scroll_failures: usize,
    expired_scrolls: usize,
    in_flight: usize,
    max_in_flight: usize,
}

struct OpenScroll {
    hits: Vec<Hit>,
    offset: usize,
    page_size: usize,
}

/// Scrolling search cluster backed by a fixed alias to records table.
///
/// Every page carries a continuation token; the result set ends with an
/// empty page, the way a real scroll context behaves.
#[derive(Default)]
pub(crate) struct MockSearchCluster {
    matches: HashMap<String, Vec<(String, f64)>>,
    down: HashSet<Endpoint>,
    failing_aliases: HashSet<String>,
    latency: Option<Duration>,
    scroll_latency: Option<Duration>,
    state: Mutex<ClusterState>,
}

struct InFlight<'a>(&'a Mutex<ClusterState>);

impl<'a> InFlight<'a> {
    fn enter(state: &'a Mutex<ClusterState>) -> Self {
        let mut s = state.lock().unwrap();
        s.in_flight += 1;
        s.max_in_flight = s.max_in_flight.max(s.in_flight);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut s) = self.0.lock() {
            s.in_flight -= 1;
        }
    }
}

impl MockSearchCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records matched by `alias`, as (record id, score).
    pub(crate) fn with_matches<I>(mut self, alias: &str, records: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        self.matches
            .entry(alias.to_string())
            .or_default()
            .extend(records);
        self
    }

    /// Refuse every request sent to `endpoint`.
    pub(crate) fn with_down(mut self, endpoint: Endpoint) -> Self {
        self.down.insert(endpoint);
        self
    }

    /// Answer 503 to every query containing `alias`, on every node.
    pub(crate) fn with_failing_alias(mut self, alias: &str) -> Self {
        self.failing_aliases.insert(alias.to_string());
        self
    }

    /// Delay every search and scroll call.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay scroll calls only; opening a search stays fast.
    pub(crate) fn with_scroll_latency(mut self, latency: Duration) -> Self {
        self.scroll_latency = Some(latency);
        self
    }

    /// Fail the next `n` scroll calls with a 503.
    pub(crate) fn with_scroll_failures(self, n: usize) -> Self {
        self.state.lock().unwrap().scroll_failures = n;
        self
    }

    /// Drop the scroll context on the next `n` scroll calls.
    pub(crate) fn with_expired_scrolls(self, n: usize) -> Self {
        self.state.lock().unwrap().expired_scrolls = n;
        self
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.state.lock().unwrap().search_calls
    }

    /// Search and scroll calls addressed to `endpoint`.
    pub(crate) fn calls_to(&self, endpoint: &Endpoint) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn cleared_scrolls(&self) -> usize {
        self.state.lock().unwrap().cleared
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    async fn arrive(&self, endpoint: &Endpoint, search: bool) -> Result<(), SearchError> {
        {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(endpoint.clone()).or_default() += 1;
            if search {
                state.search_calls += 1;
            }
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.down.contains(endpoint) {
            return Err(SearchError::connection(format!("{} refused connection", endpoint)));
        }
        Ok(())
    }

    fn next_page(scroll: &mut OpenScroll, token: &str) -> HitPage {
        let end = (scroll.offset + scroll.page_size).min(scroll.hits.len());
        let hits = scroll.hits[scroll.offset..end].to_vec();
        scroll.offset = end;
        HitPage::new(hits, ScrollState::Continue(token.to_string()))
    }
}

#[async_trait]
impl SearchNodeClient for MockSearchCluster {
    async fn search(
        &self,
        endpoint: &Endpoint,
        query: &ClauseQuery,
        page_size: usize,
    ) -> Result<HitPage, SearchError> {
        let _guard = InFlight::enter(&self.state);
        self.arrive(endpoint, true).await?;

        if query.clauses.iter().any(|c| self.failing_aliases.contains(c)) {
            return Err(SearchError::unavailable(503, "shard failure"));
        }

        let hits: Vec<Hit> = query
            .clauses
            .iter()
            .flat_map(|clause| {
                self.matches
                    .get(clause)
                    .into_iter()
                    .flatten()
                    .map(move |(record, score)| {
                        Hit::new(record.as_str(), query.entity_id.clone(), clause.as_str(), *score)
                    })
            })
            .collect();

        let mut state = self.state.lock().unwrap();
        state.next_token += 1;
        let token = format!("scroll-{}", state.next_token);
        let mut scroll = OpenScroll {
            hits,
            offset: 0,
            page_size,
        };
        let page = Self::next_page(&mut scroll, &token);
        state.scrolls.insert(token, scroll);
        Ok(page)
    }

    async fn scroll(
        &self,
        endpoint: &Endpoint,
        _entity_id: &EntityId,
        token: &str,
    ) -> Result<HitPage, SearchError> {
        let _guard = InFlight::enter(&self.state);
        self.arrive(endpoint, false).await?;
        if let Some(latency) = self.scroll_latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.scroll_failures > 0 {
            state.scroll_failures -= 1;
            return Err(SearchError::unavailable(503, "node overloaded"));
        }
        if state.expired_scrolls > 0 {
            state.expired_scrolls -= 1;
            state.scrolls.remove(token);
        }
        match state.scrolls.get_mut(token) {
            Some(scroll) => Ok(Self::next_page(scroll, token)),
            None => Err(SearchError::ScrollExpired(token.to_string())),
        }
    }

    async fn clear_scroll(&self, _endpoint: &Endpoint, token: &str) -> Result<(), SearchError> {
        let mut state = self.state.lock().unwrap();
        state.cleared += 1;
        state.scrolls.remove(token);
        Ok(())
    }
}

/// In-memory stores plus the context wired to them.
pub(crate) struct Harness {
    pub ctx: MappingContext,
    pub mappings: Arc<InMemoryMappingStore>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
}

pub(crate) fn harness(
    cluster: Arc<MockSearchCluster>,
    ports: &[u16],
    config: PipelineConfig,
) -> Harness {
    harness_with_checkpoints(cluster, ports, config, Arc::new(InMemoryCheckpointStore::new()))
}

pub(crate) fn harness_with_checkpoints(
    cluster: Arc<MockSearchCluster>,
    ports: &[u16],
    config: PipelineConfig,
    checkpoints: Arc<InMemoryCheckpointStore>,
) -> Harness {
    let mappings = Arc::new(InMemoryMappingStore::new());
    let pool = EndpointPool::new(ports.iter().map(|p| endpoint(*p)).collect()).unwrap();
    let ctx = MappingContext::new(pool, cluster, mappings.clone(), checkpoints.clone(), config);
    Harness {
        ctx,
        mappings,
        checkpoints,
    }
}

pub(crate) fn context_with(
    cluster: Arc<MockSearchCluster>,
    ports: &[u16],
    config: PipelineConfig,
) -> MappingContext {
    harness(cluster, ports, config).ctx
}

/// Mapping store that fails its first `n` writes.
pub(crate) struct FlakyMappingStore {
    pub inner: InMemoryMappingStore,
    failures_left: Mutex<usize>,
}

impl FlakyMappingStore {
    pub(crate) fn failing(n: usize) -> Self {
        Self {
            inner: InMemoryMappingStore::new(),
            failures_left: Mutex::new(n),
        }
    }
}

#[async_trait]
impl MappingStore for FlakyMappingStore {
    async fn upsert_mappings(&self, rows: &[MappingRow]) -> Result<(), StoreError> {
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::connection("database went away"));
            }
        }
        self.inner.upsert_mappings(rows).await
    }
}

/// Registry that knows a fixed set of verified records.
pub(crate) struct StaticRegistry(pub HashSet<RecordId>);

impl StaticRegistry {
    pub(crate) fn of(ids: &[&str]) -> Self {
        Self(ids.iter().map(|id| RecordId::from(*id)).collect())
    }
}

#[async_trait]
impl RecordRegistry for StaticRegistry {
    async fn filter_verified(&self, record_ids: &[RecordId]) -> Result<HashSet<RecordId>, StoreError> {
        Ok(record_ids
            .iter()
            .filter(|id| self.0.contains(*id))
            .cloned()
            .collect())
    }
}
