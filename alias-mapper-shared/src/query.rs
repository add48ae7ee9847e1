//! Disjunctive clause queries.

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// The record corpus a query is aimed at: an index and the text field to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    pub index: String,
    pub field: String,
}

impl Corpus {
    pub fn new(index: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            field: field.into(),
        }
    }
}

/// One "should" clause per alias plus a minimum-should-match threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseQuery {
    /// The entity every hit of this query maps to.
    pub entity_id: EntityId,
    /// Index of the alias batch the query was built from.
    pub batch_index: usize,
    pub corpus: Corpus,
    pub clauses: Vec<String>,
    pub min_should_match: usize,
}
