//! Per-group and per-run reports.

use serde::Serialize;

use alias_mapper_shared::GroupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOutcome {
    /// Rows persisted and the group checkpointed.
    Completed,
    /// Already checkpointed by an earlier run.
    Skipped,
    /// Rows of the successful batches persisted, but batches failed and the
    /// group was left open for the next run.
    Incomplete,
    /// A group-level error stopped the group before its checkpoint.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub group_id: GroupId,
    pub outcome: GroupOutcome,
    pub batches_total: usize,
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    pub raw_hits: usize,
    pub verified_rows: usize,
    pub persisted_rows: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GroupReport {
    pub(crate) fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            outcome: GroupOutcome::Failed,
            batches_total: 0,
            batches_succeeded: 0,
            batches_failed: 0,
            raw_hits: 0,
            verified_rows: 0,
            persisted_rows: 0,
            elapsed_ms: 0,
            error: None,
        }
    }
}

/// Outcome of one run over the entity feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub groups: Vec<GroupReport>,
    /// The run stopped on a shutdown signal before every group was processed.
    pub interrupted: bool,
}

impl RunReport {
    fn count(&self, outcome: GroupOutcome) -> usize {
        self.groups.iter().filter(|g| g.outcome == outcome).count()
    }

    pub fn completed(&self) -> usize {
        self.count(GroupOutcome::Completed)
    }

    pub fn skipped(&self) -> usize {
        self.count(GroupOutcome::Skipped)
    }

    pub fn incomplete(&self) -> usize {
        self.count(GroupOutcome::Incomplete)
    }

    pub fn failed(&self) -> usize {
        self.count(GroupOutcome::Failed)
    }

    /// Groups that were processed in this run, i.e. not skipped.
    pub fn attempted(&self) -> usize {
        self.groups.len() - self.skipped()
    }

    pub fn persisted_rows(&self) -> usize {
        self.groups.iter().map(|g| g.persisted_rows).sum()
    }

    /// Completed groups over attempted groups; 1.0 when nothing was attempted.
    pub fn success_ratio(&self) -> f64 {
        match self.attempted() {
            0 => 1.0,
            attempted => self.completed() as f64 / attempted as f64,
        }
    }

    pub fn meets(&self, min_success_ratio: f64) -> bool {
        self.success_ratio() >= min_success_ratio
    }
}
