//! OpenSearch query builders and response parsing.
//!
//! Clause queries are rendered as a `bool` query with one named
//! `match_phrase` clause per alias. Naming each clause after its alias makes
//! OpenSearch report the aliases a document matched in `matched_queries`.

use serde_json::{json, Value};
use tracing::debug;

use crate::errors::SearchError;
use alias_mapper_shared::{ClauseQuery, EntityId, Hit, HitPage, RecordId, ScrollState};

/// Build the request body for the first page of a scrolled clause query.
///
/// Only the record id field is fetched from `_source`.
pub fn build_clause_query(query: &ClauseQuery, page_size: usize, record_id_field: &str) -> Value {
    let field = query.corpus.field.as_str();
    let should: Vec<Value> = query
        .clauses
        .iter()
        .map(|alias| {
            let mut phrase = serde_json::Map::new();
            phrase.insert(
                field.to_string(),
                json!({
                    "query": alias,
                    "_name": alias
                }),
            );
            json!({ "match_phrase": phrase })
        })
        .collect();

    json!({
        "size": page_size,
        "query": {
            "bool": {
                "should": should,
                "minimum_should_match": query.min_should_match
            }
        },
        "_source": [record_id_field]
    })
}

/// Parse a search or scroll response into a page of hits for `entity_id`.
///
/// Hits whose `_source` lacks the record id field are skipped, but still
/// counted in `raw_count` so the page does not read as the end of the
/// scroll. When a document matched several aliases the longest one is
/// reported.
pub fn parse_hit_page(
    body: &Value,
    entity_id: &EntityId,
    record_id_field: &str,
) -> Result<HitPage, SearchError> {
    let raw_hits = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::parse("response has no hits.hits array"))?;

    let hits: Vec<Hit> = raw_hits
        .iter()
        .filter_map(|hit| parse_hit(hit, entity_id, record_id_field))
        .collect();
    if hits.len() < raw_hits.len() {
        debug!(
            skipped = raw_hits.len() - hits.len(),
            field = record_id_field,
            "Skipped hits without a record id"
        );
    }

    let scroll = match body.get("_scroll_id").and_then(Value::as_str) {
        Some(token) => ScrollState::Continue(token.to_string()),
        None => ScrollState::Exhausted,
    };

    Ok(HitPage::new(hits, scroll).with_raw_count(raw_hits.len()))
}

fn parse_hit(hit: &Value, entity_id: &EntityId, record_id_field: &str) -> Option<Hit> {
    let record_id = match hit.get("_source")?.get(record_id_field)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0);

    let matched_alias = hit
        .get("matched_queries")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .max_by_key(|alias| alias.chars().count())
        .unwrap_or_default()
        .to_string();

    Some(Hit {
        record_id: RecordId::new(record_id),
        entity_id: entity_id.clone(),
        matched_alias,
        score,
    })
}
