//! Settings read from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alias_mapper_pipeline::{
    AcceptanceRule, BatcherConfig, CompletionPolicy, DispatchConfig, PipelineConfig, RetryPolicy,
};
use alias_mapper_repository::{Endpoint, OpenSearchConfig};
use alias_mapper_shared::Corpus;

use crate::MapperError;

/// Default host the port range is expanded against.
const DEFAULT_OPENSEARCH_HOST: &str = "http://localhost";

/// Default inclusive port range of the cluster nodes.
const DEFAULT_OPENSEARCH_PORT_RANGE: &str = "9500-9540";

const DEFAULT_SEARCH_INDEX: &str = "high_shard_index_40";
const DEFAULT_SEARCH_FIELD: &str = "resume";
const DEFAULT_RECORD_ID_FIELD: &str = "candidateid";
const DEFAULT_SCROLL_KEEP_ALIVE: &str = "5m";

/// Default PostgreSQL URL.
const DEFAULT_DATABASE_URL: &str = "postgres://localhost/alias_mapper";
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

const DEFAULT_VERIFICATION_CHUNK_SIZE: usize = 5000;
const DEFAULT_PERSIST_CHUNK_SIZE: usize = 1000;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(MapperError::config(format!(
                "LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                other
            ))),
        }
    }
}

/// Everything the mapper reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoints: Vec<Endpoint>,
    pub opensearch: OpenSearchConfig,
    pub database_url: String,
    pub database_max_connections: u32,
    /// JSON-lines entity feed; entities come from PostgreSQL when unset.
    pub entities_file: Option<PathBuf>,
    /// Append-only checkpoint file; checkpoints live in PostgreSQL when unset.
    pub checkpoint_file: Option<PathBuf>,
    pub verify_records: bool,
    pub verification_chunk_size: usize,
    pub persist_chunk_size: usize,
    /// Use in-memory stores so that nothing is written.
    pub dry_run: bool,
    pub log_format: LogFormat,
    pub pipeline: PipelineConfig,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_ENDPOINTS`: Comma-separated node URLs. When unset, nodes
    ///   are `OPENSEARCH_HOST` (default: http://localhost) on every port of
    ///   `OPENSEARCH_PORT_RANGE` (default: 9500-9540)
    /// - `SEARCH_INDEX`, `SEARCH_FIELD`, `RECORD_ID_FIELD`: Corpus layout
    /// - `DATABASE_URL`: PostgreSQL URL (default: postgres://localhost/alias_mapper)
    /// - `ENTITIES_FILE`, `CHECKPOINT_FILE`: File-backed alternatives to PostgreSQL
    /// - `BATCH_SIZE`, `PAGE_SIZE`, `MAX_CONCURRENT_QUERIES`, `GROUP_WORKERS`,
    ///   retry and timeout knobs: Pipeline tuning
    /// - `COMPLETION_POLICY`: `strict` (default) or `partial`
    /// - `DRY_RUN`: Write nothing (default: false)
    pub fn from_env() -> Result<Self, MapperError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the raw value of a variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MapperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoints = match var("OPENSEARCH_ENDPOINTS") {
            Some(list) => parse_endpoint_list(&list)?,
            None => expand_port_range(
                &var("OPENSEARCH_HOST").unwrap_or_else(|| DEFAULT_OPENSEARCH_HOST.to_string()),
                &var("OPENSEARCH_PORT_RANGE")
                    .unwrap_or_else(|| DEFAULT_OPENSEARCH_PORT_RANGE.to_string()),
            )?,
        };

        let opensearch = OpenSearchConfig {
            record_id_field: var("RECORD_ID_FIELD")
                .unwrap_or_else(|| DEFAULT_RECORD_ID_FIELD.to_string()),
            scroll_keep_alive: var("SCROLL_KEEP_ALIVE")
                .unwrap_or_else(|| DEFAULT_SCROLL_KEEP_ALIVE.to_string()),
        };

        let defaults = PipelineConfig::default();
        let retry = RetryPolicy {
            max_retries: parse_or(&var, "MAX_RETRIES", defaults.dispatch.retry.max_retries)?,
            initial_delay: Duration::from_millis(parse_or(
                &var,
                "INITIAL_RETRY_DELAY_MS",
                defaults.dispatch.retry.initial_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_or(
                &var,
                "MAX_RETRY_DELAY_MS",
                defaults.dispatch.retry.max_delay.as_millis() as u64,
            )?),
        };

        let pipeline = PipelineConfig {
            batcher: BatcherConfig {
                batch_size: parse_or(&var, "BATCH_SIZE", defaults.batcher.batch_size)?,
                min_should_match: parse_or(&var, "MIN_SHOULD_MATCH", defaults.batcher.min_should_match)?,
                expand_variations: parse_bool_or(
                    &var,
                    "EXPAND_VARIATIONS",
                    defaults.batcher.expand_variations,
                )?,
                corpus: Corpus::new(
                    var("SEARCH_INDEX").unwrap_or_else(|| DEFAULT_SEARCH_INDEX.to_string()),
                    var("SEARCH_FIELD").unwrap_or_else(|| DEFAULT_SEARCH_FIELD.to_string()),
                ),
            },
            dispatch: DispatchConfig {
                page_size: parse_or(&var, "PAGE_SIZE", defaults.dispatch.page_size)?,
                max_concurrent_queries: parse_or(
                    &var,
                    "MAX_CONCURRENT_QUERIES",
                    defaults.dispatch.max_concurrent_queries,
                )?,
                request_timeout: Duration::from_secs(parse_or(
                    &var,
                    "REQUEST_TIMEOUT_SECS",
                    defaults.dispatch.request_timeout.as_secs(),
                )?),
                group_timeout: Duration::from_secs(parse_or(
                    &var,
                    "GROUP_TIMEOUT_SECS",
                    defaults.dispatch.group_timeout.as_secs(),
                )?),
                retry,
            },
            acceptance: AcceptanceRule {
                min_score: parse_or(&var, "MIN_SCORE", defaults.acceptance.min_score)?,
                min_alias_chars: parse_or(&var, "MIN_ALIAS_CHARS", defaults.acceptance.min_alias_chars)?,
            },
            completion: match var("COMPLETION_POLICY") {
                Some(policy) => policy.parse::<CompletionPolicy>()?,
                None => defaults.completion,
            },
            group_workers: parse_or(&var, "GROUP_WORKERS", defaults.group_workers)?,
            min_success_ratio: parse_or(&var, "MIN_SUCCESS_RATIO", defaults.min_success_ratio)?,
        };
        pipeline.validate()?;

        Ok(Self {
            endpoints,
            opensearch,
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: parse_or(
                &var,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            entities_file: var("ENTITIES_FILE").map(PathBuf::from),
            checkpoint_file: var("CHECKPOINT_FILE").map(PathBuf::from),
            verify_records: parse_bool_or(&var, "VERIFY_RECORDS", true)?,
            verification_chunk_size: parse_or(
                &var,
                "VERIFICATION_CHUNK_SIZE",
                DEFAULT_VERIFICATION_CHUNK_SIZE,
            )?,
            persist_chunk_size: parse_or(&var, "PERSIST_CHUNK_SIZE", DEFAULT_PERSIST_CHUNK_SIZE)?,
            dry_run: parse_bool_or(&var, "DRY_RUN", false)?,
            log_format: match var("LOG_FORMAT") {
                Some(format) => format.parse()?,
                None => LogFormat::default(),
            },
            pipeline,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, MapperError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| MapperError::config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(var: &F, key: &str, default: bool) -> Result<bool, MapperError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(MapperError::config(format!("{} must be a boolean, got '{}'", key, raw))),
    }
}

/// Parse a comma-separated list of node URLs.
pub(crate) fn parse_endpoint_list(list: &str) -> Result<Vec<Endpoint>, MapperError> {
    list.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| {
            Endpoint::parse(url)
                .map_err(|e| MapperError::config(format!("invalid endpoint '{}': {}", url, e)))
        })
        .collect()
}

/// One endpoint per port of an inclusive `start-end` range on `host`.
pub(crate) fn expand_port_range(host: &str, range: &str) -> Result<Vec<Endpoint>, MapperError> {
    let invalid = || MapperError::config(format!("invalid port range '{}', expected start-end", range));

    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start: u16 = start.trim().parse().map_err(|_| invalid())?;
    let end: u16 = end.trim().parse().map_err(|_| invalid())?;
    if start > end {
        return Err(invalid());
    }

    let host = host.trim().trim_end_matches('/');
    (start..=end)
        .map(|port| {
            let url = format!("{}:{}", host, port);
            Endpoint::parse(&url)
                .map_err(|e| MapperError::config(format!("invalid endpoint '{}': {}", url, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, MapperError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.endpoints.len(), 41);
        assert_eq!(settings.endpoints[0].url().port(), Some(9500));
        assert_eq!(settings.pipeline.batcher.batch_size, 50);
        assert_eq!(settings.pipeline.batcher.corpus.index, "high_shard_index_40");
        assert_eq!(settings.pipeline.dispatch.page_size, 2000);
        assert_eq!(settings.pipeline.dispatch.request_timeout, Duration::from_secs(500));
        assert_eq!(settings.pipeline.completion, CompletionPolicy::RequireAllBatches);
        assert_eq!(settings.opensearch.record_id_field, "candidateid");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.verify_records);
        assert!(!settings.dry_run);
        assert!(settings.entities_file.is_none());
    }

    #[test]
    fn test_explicit_endpoints_override_port_range() {
        let settings = settings(&[
            ("OPENSEARCH_ENDPOINTS", "http://node-a:9200, http://node-b:9200,"),
            ("OPENSEARCH_PORT_RANGE", "1-2"),
        ])
        .unwrap();

        assert_eq!(settings.endpoints.len(), 2);
        assert_eq!(settings.endpoints[1].url().host_str(), Some("node-b"));
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("BATCH_SIZE", "25"),
            ("MAX_RETRIES", "2"),
            ("INITIAL_RETRY_DELAY_MS", "250"),
            ("COMPLETION_POLICY", "partial"),
            ("MIN_SUCCESS_RATIO", "0.9"),
            ("DRY_RUN", "yes"),
            ("LOG_FORMAT", "JSON"),
            ("ENTITIES_FILE", "/data/colleges.jsonl"),
        ])
        .unwrap();

        assert_eq!(settings.pipeline.batcher.batch_size, 25);
        assert_eq!(settings.pipeline.dispatch.retry.max_retries, 2);
        assert_eq!(
            settings.pipeline.dispatch.retry.initial_delay,
            Duration::from_millis(250)
        );
        assert_eq!(settings.pipeline.completion, CompletionPolicy::AllowPartial);
        assert_eq!(settings.pipeline.min_success_ratio, 0.9);
        assert!(settings.dry_run);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(
            settings.entities_file,
            Some(PathBuf::from("/data/colleges.jsonl"))
        );
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            vec![("BATCH_SIZE", "fifty")],
            vec![("BATCH_SIZE", "0")],
            vec![("DRY_RUN", "maybe")],
            vec![("MIN_SUCCESS_RATIO", "1.5")],
            vec![("COMPLETION_POLICY", "sometimes")],
            vec![("OPENSEARCH_ENDPOINTS", "not a url")],
            vec![("OPENSEARCH_PORT_RANGE", "9540-9500")],
        ] {
            assert!(
                matches!(settings(&vars), Err(MapperError::ConfigError(_)) | Err(MapperError::PipelineError(_))),
                "{:?} should be rejected",
                vars
            );
        }
    }

    #[test]
    fn test_expand_port_range() {
        let endpoints = expand_port_range("http://localhost/", "9501-9503").unwrap();
        let ports: Vec<_> = endpoints.iter().map(|e| e.url().port()).collect();

        assert_eq!(ports, vec![Some(9501), Some(9502), Some(9503)]);
        assert!(expand_port_range("http://localhost", "9501").is_err());
        assert!(expand_port_range("http://localhost", "a-b").is_err());
    }
}
