//! Entities and the alias batches carved out of them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// A target entity described by many textual aliases.
///
/// Entities are read-only inputs: they are loaded once before processing
/// starts and shared between workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// The entity's identifier; also the id of its checkpoint group.
    pub id: EntityId,
    /// Canonical display name, searched alongside the aliases.
    #[serde(default)]
    pub name: Option<String>,
    /// Alias strings in source order.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Entity {
    /// Create an entity with no name and no aliases.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            aliases: Vec::new(),
        }
    }

    /// Set the canonical name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the alias list.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// All strings to search for this entity: the aliases followed by the
    /// canonical name, blanks removed, duplicates dropped (first one wins).
    pub fn search_terms(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.aliases
            .iter()
            .chain(self.name.iter())
            .filter(|term| !term.trim().is_empty())
            .filter(|term| seen.insert(term.as_str()))
            .cloned()
            .collect()
    }
}

/// A bounded slice of one entity's search terms.
///
/// Each batch becomes exactly one disjunctive query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBatch {
    pub entity_id: EntityId,
    /// Position of this batch within its entity.
    pub index: usize,
    pub aliases: Vec<String>,
}

impl AliasBatch {
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_terms_appends_name() {
        let entity = Entity::new("e1")
            .with_name("Acme College")
            .with_aliases(["Acme", "ACME Coll."]);

        assert_eq!(
            entity.search_terms(),
            vec!["Acme", "ACME Coll.", "Acme College"]
        );
    }

    #[test]
    fn test_search_terms_drops_blanks_and_duplicates() {
        let entity = Entity::new("e1")
            .with_name("Acme")
            .with_aliases(["Acme", "  ", "", "Acme Tech", "Acme Tech"]);

        assert_eq!(entity.search_terms(), vec!["Acme", "Acme Tech"]);
    }

    #[test]
    fn test_entity_deserializes_with_defaults() {
        let entity: Entity = serde_json::from_str(r#"{"id": "42"}"#).unwrap();
        assert_eq!(entity.id, EntityId::from("42"));
        assert!(entity.name.is_none());
        assert!(entity.aliases.is_empty());
    }
}
