//! Dispatcher: concurrent, retried, exhaustive execution of clause queries.
//!
//! Every query runs as its own task. A task waits for a slot on the shared
//! query semaphore, picks a random node, and scrolls through the complete
//! result set. Transient failures are retried with exponential backoff on a
//! different node; a query that exhausts its retries is reported as a failed
//! batch without disturbing its siblings.

mod scroll;

pub use scroll::ScrollCursor;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, instrument, warn};

use alias_mapper_repository::{Endpoint, SearchError, SearchNodeClient};
use alias_mapper_shared::{ClauseQuery, Hit};

use crate::config::DispatchConfig;
use crate::context::MappingContext;
use crate::endpoint_pool::EndpointPool;

/// Why a batch contributed no hits.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchFailure {
    /// The search kept failing, or failed in a way that cannot be retried.
    Search { error: SearchError, attempts: u32 },
    /// The group deadline passed before the batch finished.
    TimedOut,
    /// The query task stopped unexpectedly.
    Aborted,
}

/// Result of one query unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch_index: usize,
    /// Hits collected by a successful batch.
    pub hits: usize,
    /// Pages fetched, including the final empty one.
    pub pages: usize,
    /// Requests issued, including retries.
    pub attempts: u32,
    pub failure: Option<BatchFailure>,
}

impl BatchOutcome {
    fn failed(batch_index: usize, failure: BatchFailure) -> Self {
        let attempts = match &failure {
            BatchFailure::Search { attempts, .. } => *attempts,
            _ => 0,
        };
        Self {
            batch_index,
            hits: 0,
            pages: 0,
            attempts,
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Combined result of dispatching one group's queries.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Hits of every successful batch, in completion order.
    pub hits: Vec<Hit>,
    /// One entry per batch, sorted by batch index.
    pub batches: Vec<BatchOutcome>,
}

impl DispatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.batches.iter().filter(|b| b.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.batches.len() - self.succeeded()
    }

    /// Whether every batch succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| !b.is_success())
    }
}

/// Scroll contexts held by running query tasks, keyed by batch index.
///
/// Lives outside the tasks so contexts of aborted tasks can still be
/// cleared.
#[derive(Clone, Default)]
struct OpenScrolls(Arc<Mutex<HashMap<usize, (Endpoint, String)>>>);

impl OpenScrolls {
    fn track(&self, batch_index: usize, endpoint: &Endpoint, token: Option<&str>) {
        match token {
            Some(token) => {
                let mut open = self.0.lock().unwrap_or_else(PoisonError::into_inner);
                open.insert(batch_index, (endpoint.clone(), token.to_string()));
            }
            None => self.forget(batch_index),
        }
    }

    fn forget(&self, batch_index: usize) {
        let mut open = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        open.remove(&batch_index);
    }

    fn drain(&self) -> Vec<(Endpoint, String)> {
        let mut open = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        open.drain().map(|(_, scroll)| scroll).collect()
    }
}

/// Everything a single query task needs; cloned into each task.
#[derive(Clone)]
struct QueryUnit {
    endpoints: Arc<EndpointPool>,
    search: Arc<dyn SearchNodeClient>,
    config: DispatchConfig,
}

struct UnitResult {
    hits: Vec<Hit>,
    pages: usize,
    attempts: u32,
}

impl QueryUnit {
    /// Scroll through the full result set, starting on `endpoint`.
    ///
    /// The held scroll context is recorded in `open` after every page.
    async fn run(
        &self,
        query: ClauseQuery,
        endpoint: Endpoint,
        open: &OpenScrolls,
    ) -> Result<UnitResult, BatchFailure> {
        let batch_index = query.batch_index;
        let mut endpoint = endpoint;
        let mut cursor = ScrollCursor::new(query, self.config.page_size);
        let mut hits = Vec::new();
        let mut attempts = 0u32;

        let result = loop {
            let restarts = cursor.restarts();
            let fetched = self.fetch_page(&mut cursor, &mut endpoint, &mut attempts).await;
            open.track(batch_index, &endpoint, cursor.open_token());
            match fetched {
                Ok(Some(page)) => {
                    // a restarted cursor serves the result set again from the top
                    if cursor.restarts() != restarts {
                        hits.clear();
                    }
                    hits.extend(page);
                }
                Ok(None) => break Ok(()),
                Err(error) => break Err(BatchFailure::Search { error, attempts }),
            }
        };

        open.forget(batch_index);
        self.release(&cursor, &endpoint).await;

        result.map(|()| UnitResult {
            hits,
            pages: cursor.pages(),
            attempts,
        })
    }

    /// Fetch one page, retrying transient failures on another node.
    ///
    /// A lost scroll context restarts the cursor from the first page, at
    /// most `max_retries` times over the life of the cursor.
    async fn fetch_page(
        &self,
        cursor: &mut ScrollCursor,
        endpoint: &mut Endpoint,
        attempts: &mut u32,
    ) -> Result<Option<Vec<Hit>>, SearchError> {
        let policy = &self.config.retry;
        let mut retry = 0u32;

        loop {
            *attempts += 1;
            let result = match timeout(
                self.config.request_timeout,
                cursor.next_page(self.search.as_ref(), endpoint),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SearchError::timeout(format!(
                    "no response from {} within {:?}",
                    endpoint, self.config.request_timeout
                ))),
            };

            let error = match result {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };

            let expired = matches!(error, SearchError::ScrollExpired(_));
            if retry >= policy.max_retries || !(error.is_retryable() || expired) {
                return Err(error);
            }

            if expired {
                if cursor.restarts() >= policy.max_retries {
                    return Err(error);
                }
                cursor.restart();
            }

            let delay = policy.backoff(retry);
            let next = self.endpoints.pick_excluding(endpoint).clone();
            warn!(
                entity_id = %cursor.query().entity_id,
                batch = cursor.query().batch_index,
                attempt = retry + 1,
                max_retries = policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                failed_endpoint = %endpoint,
                next_endpoint = %next,
                error = %error,
                "Search request failed, retrying"
            );

            sleep(delay).await;
            *endpoint = next;
            retry += 1;
        }
    }

    /// Release the scroll context; failures only cost server memory until
    /// the keep-alive expires.
    async fn release(&self, cursor: &ScrollCursor, endpoint: &Endpoint) {
        if let Some(token) = cursor.open_token() {
            self.clear_scroll(endpoint, token).await;
        }
    }

    async fn clear_scroll(&self, endpoint: &Endpoint, token: &str) {
        match timeout(self.config.request_timeout, self.search.clear_scroll(endpoint, token)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(endpoint = %endpoint, error = %e, "Failed to clear scroll"),
            Err(_) => debug!(endpoint = %endpoint, "Clear scroll timed out"),
        }
    }
}

/// Fans a group's queries out across the cluster.
pub struct Dispatcher {
    unit: QueryUnit,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(ctx: &MappingContext) -> Self {
        Self {
            unit: QueryUnit {
                endpoints: ctx.endpoints.clone(),
                search: ctx.search.clone(),
                config: ctx.config.dispatch.clone(),
            },
            permits: ctx.query_permits.clone(),
        }
    }

    /// Run every query to completion or failure.
    ///
    /// Never fails as a whole: failed batches are reported in the outcome
    /// and their hits dropped. When the group deadline passes, unfinished
    /// batches are aborted and reported as [`BatchFailure::TimedOut`].
    #[instrument(skip_all, fields(queries = queries.len()))]
    pub async fn dispatch(&self, queries: Vec<ClauseQuery>) -> DispatchOutcome {
        let mut tasks = JoinSet::new();
        let mut pending: BTreeSet<usize> = BTreeSet::new();
        let open = OpenScrolls::default();

        for query in queries {
            let index = query.batch_index;
            let unit = self.unit.clone();
            let permits = self.permits.clone();
            let open = open.clone();
            pending.insert(index);

            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        let endpoint = unit.endpoints.pick().clone();
                        unit.run(query, endpoint, &open).await
                    }
                    Err(_) => Err(BatchFailure::Aborted),
                };
                (index, result)
            });
        }

        let mut outcome = DispatchOutcome::default();

        let collected = timeout(self.unit.config.group_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                // a panicked task stays in `pending` and is reported below
                let Ok((index, result)) = joined else {
                    continue;
                };
                pending.remove(&index);
                match result {
                    Ok(unit) => {
                        outcome.batches.push(BatchOutcome {
                            batch_index: index,
                            hits: unit.hits.len(),
                            pages: unit.pages,
                            attempts: unit.attempts,
                            failure: None,
                        });
                        outcome.hits.extend(unit.hits);
                    }
                    Err(failure) => {
                        error!(batch = index, failure = ?failure, "Batch failed, dropping its hits");
                        outcome.batches.push(BatchOutcome::failed(index, failure));
                    }
                }
            }
        })
        .await;

        let leftover = if collected.is_err() {
            tasks.abort_all();
            warn!(
                unfinished = pending.len(),
                timeout_secs = self.unit.config.group_timeout.as_secs(),
                "Group deadline passed, aborting remaining batches"
            );
            let abandoned = open.drain();
            debug!(scrolls = abandoned.len(), "Clearing scrolls of aborted batches");
            join_all(
                abandoned
                    .iter()
                    .map(|(endpoint, token)| self.unit.clear_scroll(endpoint, token)),
            )
            .await;
            BatchFailure::TimedOut
        } else {
            BatchFailure::Aborted
        };

        for index in pending {
            outcome.batches.push(BatchOutcome::failed(index, leftover.clone()));
        }

        outcome.batches.sort_by_key(|b| b.batch_index);
        outcome
    }
}
