//! Search node client trait definition.
//!
//! This module defines the abstract interface to a horizontally sharded
//! search cluster: disjunctive clause queries with scrolled retrieval,
//! addressed to one node at a time.

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::types::Endpoint;
use alias_mapper_shared::{ClauseQuery, EntityId, HitPage};

/// Abstract interface for scrolled search against individual cluster nodes.
///
/// Callers choose the node for every request, which lets them spread load
/// and steer retries away from a failing node.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait SearchNodeClient: Send + Sync {
    /// Open a scrolled search and return its first page.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The node to send the request to
    /// * `query` - Should clauses, minimum-should-match and target corpus
    /// * `page_size` - Number of hits per page
    ///
    /// # Returns
    ///
    /// * `Ok(HitPage)` - The first page and the continuation state
    /// * `Err(SearchError)` - If the request fails
    async fn search(
        &self,
        endpoint: &Endpoint,
        query: &ClauseQuery,
        page_size: usize,
    ) -> Result<HitPage, SearchError>;

    /// Fetch the page following `token`.
    ///
    /// Scroll tokens are valid cluster-wide, so any node may serve the next
    /// page. `entity_id` is stamped onto the returned hits.
    async fn scroll(
        &self,
        endpoint: &Endpoint,
        entity_id: &EntityId,
        token: &str,
    ) -> Result<HitPage, SearchError>;

    /// Release the server-side scroll context.
    ///
    /// The default implementation does nothing, for backends whose cursors
    /// expire on their own.
    async fn clear_scroll(&self, _endpoint: &Endpoint, _token: &str) -> Result<(), SearchError> {
        Ok(())
    }
}
