//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchNodeClient`
//! using the OpenSearch Rust client, with one single-node transport per
//! cluster endpoint.

use std::collections::HashMap;

use async_trait::async_trait;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    ClearScrollParts, OpenSearch, ScrollParts, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::errors::SearchError;
use crate::interfaces::SearchNodeClient;
use crate::opensearch::queries::{build_clause_query, parse_hit_page};
use crate::types::Endpoint;
use alias_mapper_shared::{ClauseQuery, EntityId, HitPage};

/// Settings shared by every request the client sends.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// `_source` field holding the record identifier.
    pub record_id_field: String,
    /// How long the cluster keeps a scroll context alive between pages.
    pub scroll_keep_alive: String,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            record_id_field: "candidateid".to_string(),
            scroll_keep_alive: "5m".to_string(),
        }
    }
}

/// OpenSearch client addressing individual cluster nodes.
///
/// # Example
///
/// ```ignore
/// let endpoints = vec![Endpoint::parse("http://localhost:9501")?];
/// let client = OpenSearchNodeClient::new(&endpoints, OpenSearchConfig::default())?;
/// let first = client.search(&endpoints[0], &query, 2000).await?;
/// ```
pub struct OpenSearchNodeClient {
    nodes: HashMap<Endpoint, OpenSearch>,
    config: OpenSearchConfig,
}

impl OpenSearchNodeClient {
    /// Create one transport per endpoint.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchNodeClient)` - A new client instance
    /// * `Err(SearchError)` - If a transport cannot be built
    pub fn new(endpoints: &[Endpoint], config: OpenSearchConfig) -> Result<Self, SearchError> {
        let mut nodes = HashMap::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let conn_pool = SingleNodeConnectionPool::new(endpoint.url().clone());
            let transport = TransportBuilder::new(conn_pool)
                .disable_proxy()
                .build()
                .map_err(|e| SearchError::connection(e.to_string()))?;
            nodes.insert(endpoint.clone(), OpenSearch::new(transport));
        }

        info!(
            nodes = nodes.len(),
            record_id_field = %config.record_id_field,
            scroll_keep_alive = %config.scroll_keep_alive,
            "Created OpenSearch node clients"
        );

        Ok(Self { nodes, config })
    }

    fn node(&self, endpoint: &Endpoint) -> Result<&OpenSearch, SearchError> {
        self.nodes
            .get(endpoint)
            .ok_or_else(|| SearchError::UnknownEndpoint(endpoint.to_string()))
    }

    /// Turn a transport response into a JSON body, classifying failures.
    async fn read_body(response: Response) -> Result<Value, SearchError> {
        let status = response.status_code();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| SearchError::parse(e.to_string()));
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(code, body))
    }
}

/// Map a non-success HTTP status to a search error.
fn classify_status(code: u16, body: String) -> SearchError {
    match code {
        404 if body.contains("search_context_missing") => SearchError::ScrollExpired(body),
        408 => SearchError::timeout(body),
        429 | 500..=599 => SearchError::unavailable(code, body),
        _ => SearchError::query(format!("status {}: {}", code, body)),
    }
}

fn transport_error(err: opensearch::Error) -> SearchError {
    if err.is_timeout() {
        return SearchError::timeout(err.to_string());
    }
    match err.status_code() {
        Some(status) => classify_status(status.as_u16(), err.to_string()),
        None => SearchError::connection(err.to_string()),
    }
}

#[async_trait]
impl SearchNodeClient for OpenSearchNodeClient {
    #[instrument(skip(self, endpoint, query), fields(endpoint = %endpoint, entity_id = %query.entity_id, batch = query.batch_index))]
    async fn search(
        &self,
        endpoint: &Endpoint,
        query: &ClauseQuery,
        page_size: usize,
    ) -> Result<HitPage, SearchError> {
        let body = build_clause_query(query, page_size, &self.config.record_id_field);

        let response = self
            .node(endpoint)?
            .search(SearchParts::Index(&[query.corpus.index.as_str()]))
            .scroll(&self.config.scroll_keep_alive)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let body = Self::read_body(response).await?;
        let page = parse_hit_page(&body, &query.entity_id, &self.config.record_id_field)?;

        debug!(hits = page.hits.len(), clauses = query.clauses.len(), "Opened scroll");
        Ok(page)
    }

    async fn scroll(
        &self,
        endpoint: &Endpoint,
        entity_id: &EntityId,
        token: &str,
    ) -> Result<HitPage, SearchError> {
        let response = self
            .node(endpoint)?
            .scroll(ScrollParts::None)
            .body(json!({
                "scroll": self.config.scroll_keep_alive,
                "scroll_id": token
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let body = Self::read_body(response).await?;
        parse_hit_page(&body, entity_id, &self.config.record_id_field)
    }

    async fn clear_scroll(&self, endpoint: &Endpoint, token: &str) -> Result<(), SearchError> {
        let response = self
            .node(endpoint)?
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [token] }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        // 404: the context already expired
        if !status.is_success() && status.as_u16() != 404 {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Clear scroll failed");
            return Err(classify_status(status.as_u16(), body));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(503, String::new()),
            SearchError::Unavailable { status: 503, .. }
        ));
        assert!(matches!(
            classify_status(429, String::new()),
            SearchError::Unavailable { status: 429, .. }
        ));
        assert!(matches!(
            classify_status(404, "search_context_missing_exception".into()),
            SearchError::ScrollExpired(_)
        ));
        assert!(matches!(
            classify_status(400, "parsing_exception".into()),
            SearchError::QueryError(_)
        ));
    }

    #[test]
    fn test_new_registers_every_endpoint() {
        let endpoints = vec![
            Endpoint::parse("http://localhost:9501").unwrap(),
            Endpoint::parse("http://localhost:9502").unwrap(),
        ];

        let client = OpenSearchNodeClient::new(&endpoints, OpenSearchConfig::default()).unwrap();

        assert!(client.node(&endpoints[1]).is_ok());
        let unknown = Endpoint::parse("http://localhost:9999").unwrap();
        assert!(matches!(
            client.node(&unknown),
            Err(SearchError::UnknownEndpoint(_))
        ));
    }
}
