//! Configuration types for the mapping pipeline.
//!
//! Every threshold the pipeline uses lives here; none is hardcoded at its
//! point of use. Defaults mirror the values the mapper was tuned with in
//! production.

use std::str::FromStr;
use std::time::Duration;

use alias_mapper_shared::Corpus;

use crate::errors::PipelineError;

/// How aliases are turned into queries.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Maximum number of should clauses per query.
    pub batch_size: usize,
    /// Should clauses a document must match to be returned.
    pub min_should_match: usize,
    /// Search lowercased and punctuation-stripped forms of every alias.
    pub expand_variations: bool,
    /// Target index and text field.
    pub corpus: Corpus,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            min_should_match: 1,
            expand_variations: true,
            corpus: Corpus::new("high_shard_index_40", "resume"),
        }
    }
}

/// Exponential backoff for transient search failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based): the initial delay
    /// doubled per retry, capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// How queries are executed against the cluster.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Hits per scroll page.
    pub page_size: usize,
    /// Query units in flight across all groups.
    pub max_concurrent_queries: usize,
    /// Deadline for each search or scroll call.
    pub request_timeout: Duration,
    /// Deadline for all of one group's queries.
    pub group_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            page_size: 2000,
            max_concurrent_queries: 100,
            request_timeout: Duration::from_secs(500),
            group_timeout: Duration::from_secs(3600),
            retry: RetryPolicy::default(),
        }
    }
}

/// Which raw hits count as real matches.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceRule {
    /// Minimum relevance score.
    pub min_score: f64,
    /// Minimum non-whitespace characters in the matched alias.
    pub min_alias_chars: usize,
}

impl Default for AcceptanceRule {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            min_alias_chars: 2,
        }
    }
}

/// When a group with failed batches may be checkpointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionPolicy {
    /// Only checkpoint groups whose batches all succeeded; others are
    /// retried by the next run.
    #[default]
    RequireAllBatches,
    /// Record failed batches and checkpoint the group anyway.
    AllowPartial,
}

impl FromStr for CompletionPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "require_all_batches" => Ok(Self::RequireAllBatches),
            "partial" | "allow_partial" => Ok(Self::AllowPartial),
            other => Err(PipelineError::config(format!(
                "unknown completion policy '{}', expected 'strict' or 'partial'",
                other
            ))),
        }
    }
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batcher: BatcherConfig,
    pub dispatch: DispatchConfig,
    pub acceptance: AcceptanceRule,
    pub completion: CompletionPolicy,
    /// Groups processed concurrently.
    pub group_workers: usize,
    /// Share of attempted groups that must complete for a run to succeed.
    pub min_success_ratio: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batcher: BatcherConfig::default(),
            dispatch: DispatchConfig::default(),
            acceptance: AcceptanceRule::default(),
            completion: CompletionPolicy::default(),
            group_workers: 16,
            min_success_ratio: 1.0,
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let positive = [
            ("batch size", self.batcher.batch_size),
            ("minimum should match", self.batcher.min_should_match),
            ("page size", self.dispatch.page_size),
            ("max concurrent queries", self.dispatch.max_concurrent_queries),
            ("group workers", self.group_workers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(PipelineError::config(format!("{} must be at least 1", name)));
            }
        }

        if self.batcher.corpus.index.trim().is_empty() || self.batcher.corpus.field.trim().is_empty() {
            return Err(PipelineError::config("search index and field must be set"));
        }
        if self.dispatch.request_timeout.is_zero() || self.dispatch.group_timeout.is_zero() {
            return Err(PipelineError::config("timeouts must be non-zero"));
        }
        if !self.acceptance.min_score.is_finite() {
            return Err(PipelineError::config("minimum score must be a finite number"));
        }
        if !(0.0..=1.0).contains(&self.min_success_ratio) {
            return Err(PipelineError::config(format!(
                "minimum success ratio {} is outside 0..=1",
                self.min_success_ratio
            )));
        }

        Ok(())
    }
}
