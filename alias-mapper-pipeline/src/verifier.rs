//! Verifier: turns raw hits into persistable mapping rows.

use std::collections::BTreeMap;

use alias_mapper_shared::{EntityId, Hit, MappingRow, RecordId};

use crate::config::AcceptanceRule;

impl AcceptanceRule {
    /// Whether `hit` is a real match.
    ///
    /// NaN scores never pass.
    pub fn accepts(&self, hit: &Hit) -> bool {
        if hit.score.is_nan() || hit.score < self.min_score {
            return false;
        }
        let chars = hit
            .matched_alias
            .chars()
            .filter(|c| !c.is_whitespace())
            .count();
        chars >= self.min_alias_chars
    }
}

#[derive(Debug, Clone)]
pub struct Verifier {
    rule: AcceptanceRule,
}

impl Verifier {
    pub fn new(rule: AcceptanceRule) -> Self {
        Self { rule }
    }

    /// Filter hits through the acceptance rule and collapse them to one row
    /// per (record, entity) pair, keeping the highest score as confidence.
    ///
    /// Rows come out ordered by record id, then entity id.
    pub fn verify(&self, hits: &[Hit]) -> Vec<MappingRow> {
        let mut best: BTreeMap<(&RecordId, &EntityId), f64> = BTreeMap::new();
        for hit in hits.iter().filter(|hit| self.rule.accepts(hit)) {
            best.entry((&hit.record_id, &hit.entity_id))
                .and_modify(|score| *score = score.max(hit.score))
                .or_insert(hit.score);
        }

        best.into_iter()
            .map(|((record_id, entity_id), confidence)| {
                MappingRow::new(record_id.clone(), entity_id.clone(), confidence)
            })
            .collect()
    }
}
