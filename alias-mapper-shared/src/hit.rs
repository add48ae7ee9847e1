//! Raw search hits and scroll pages.

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, RecordId};

/// A single match reported by the search cluster.
///
/// The same (record, entity) pair can show up many times across batches and
/// endpoints; hits are deduplicated before anything is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub record_id: RecordId,
    pub entity_id: EntityId,
    /// The alias that produced the match.
    pub matched_alias: String,
    /// Relevance score assigned by the search engine.
    pub score: f64,
}

impl Hit {
    pub fn new(
        record_id: impl Into<RecordId>,
        entity_id: impl Into<EntityId>,
        matched_alias: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            entity_id: entity_id.into(),
            matched_alias: matched_alias.into(),
            score,
        }
    }
}

/// Whether more pages are available after a page of hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollState {
    /// Opaque continuation token for the next page.
    Continue(String),
    /// The service reported that the result set is exhausted.
    Exhausted,
}

/// One page of a scrolled result set.
#[derive(Debug, Clone, PartialEq)]
pub struct HitPage {
    pub hits: Vec<Hit>,
    pub scroll: ScrollState,
    /// Hits the service returned, including ones that could not be parsed
    /// into `hits`.
    pub raw_count: usize,
}

impl HitPage {
    pub fn new(hits: Vec<Hit>, scroll: ScrollState) -> Self {
        let raw_count = hits.len();
        Self {
            hits,
            scroll,
            raw_count,
        }
    }

    /// Record how many hits the service returned before any were dropped.
    pub fn with_raw_count(mut self, raw_count: usize) -> Self {
        self.raw_count = raw_count.max(self.hits.len());
        self
    }

    /// Whether the service itself returned no hits.
    pub fn is_raw_empty(&self) -> bool {
        self.raw_count == 0
    }

    /// The final page of a result set.
    pub fn last(hits: Vec<Hit>) -> Self {
        Self::new(hits, ScrollState::Exhausted)
    }

    /// Token for the next page, unless the sequence has ended.
    ///
    /// A page the service returned empty ends the sequence even if it
    /// handed back a token: scroll contexts keep returning ids after the
    /// last hit. A page whose hits were all dropped while parsing does not.
    pub fn next_token(&self) -> Option<&str> {
        match &self.scroll {
            ScrollState::Continue(token) if !self.is_raw_empty() => Some(token),
            _ => None,
        }
    }

    /// Any token carried by this page, including the trailing one of an empty page.
    pub fn token(&self) -> Option<&str> {
        match &self.scroll {
            ScrollState::Continue(token) => Some(token),
            ScrollState::Exhausted => None,
        }
    }
}
