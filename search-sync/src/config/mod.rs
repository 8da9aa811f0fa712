//! Configuration and dependency wiring for the search sync engine.

mod dependencies;

pub use dependencies::Dependencies;

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use search_sync_repository::{IndexConfig, SearchIndexServiceConfig};
use tracing::warn;

use crate::orchestrator::DEFAULT_PAGE_SIZE;
use crate::source::SourceRetryConfig;
use crate::IndexingError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default prefix for index and alias names.
const DEFAULT_INDEX_PREFIX: &str = "search";

/// Default directory holding the `{entity}.jsonl` source files.
const DEFAULT_SOURCE_DIR: &str = "./data";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_SHARDS: u32 = 1;
const DEFAULT_REPLICAS: u32 = 1;
const DEFAULT_BULK_MAX_ATTEMPTS: usize = 5;
const DEFAULT_BULK_BACKOFF_FACTOR_MS: u64 = 100;
const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;
const DEFAULT_SOURCE_MAX_ATTEMPTS: usize = 5;
const DEFAULT_SOURCE_BACKOFF_FACTOR_MS: u64 = 100;
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every retry interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Anything else falls back to "retry".
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch_url: String,
    pub index_prefix: String,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub request_timeout: Duration,
    pub index_config: IndexConfig,
    pub service_config: SearchIndexServiceConfig,
    /// Per-entity bulk batch sizes overriding the declared ones.
    pub batch_sizes: BTreeMap<String, usize>,
    pub source_dir: PathBuf,
    pub page_size: usize,
    pub source_retry: SourceRetryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            connection_mode: ConnectionMode::Retry,
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            index_config: IndexConfig::new(DEFAULT_SHARDS, DEFAULT_REPLICAS),
            service_config: SearchIndexServiceConfig::with_max_batch_size(DEFAULT_MAX_BATCH_SIZE)
                .with_retry(DEFAULT_BULK_MAX_ATTEMPTS, DEFAULT_BULK_BACKOFF_FACTOR_MS),
            batch_sizes: BTreeMap::new(),
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            page_size: DEFAULT_PAGE_SIZE,
            source_retry: SourceRetryConfig::default()
                .with_retry(DEFAULT_SOURCE_MAX_ATTEMPTS, DEFAULT_SOURCE_BACKOFF_FACTOR_MS)
                .with_call_timeout(Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS)),
        }
    }
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX_PREFIX`: Prefix of every index and alias name (default: search)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Connection retry interval (default: 15)
    /// - `OPENSEARCH_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
    /// - `SEARCH_INDEX_SHARDS` / `SEARCH_INDEX_REPLICAS`: Settings of new indices (default: 1)
    /// - `SEARCH_BULK_MAX_ATTEMPTS`: Attempts per bulk call (default: 5)
    /// - `SEARCH_BULK_BACKOFF_FACTOR_MS`: Backoff multiplier between attempts (default: 100)
    /// - `SEARCH_MAX_BATCH_SIZE`: Hard ceiling of documents per bulk call (default: 10000)
    /// - `SEARCH_BATCH_SIZES`: Per-entity batch sizes, e.g. `company=500,contact=2000`
    /// - `SYNC_SOURCE_DIR`: Directory of `{entity}.jsonl` source files (default: ./data)
    /// - `SYNC_PAGE_SIZE`: Records per source page in full-table runs (default: 1000)
    /// - `SYNC_SOURCE_MAX_ATTEMPTS`: Attempts per source call (default: 5)
    /// - `SYNC_SOURCE_BACKOFF_FACTOR_MS`: Backoff multiplier between source attempts (default: 100)
    /// - `SYNC_SOURCE_TIMEOUT_SECS`: Timeout of one source call (default: 30)
    ///
    /// Unparseable numbers fall back to their default with a warning. A malformed
    /// `SEARCH_BATCH_SIZES` is an error, since it would silently change batching.
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let shards = parse_or("SEARCH_INDEX_SHARDS", &lookup, DEFAULT_SHARDS);
        let replicas = parse_or("SEARCH_INDEX_REPLICAS", &lookup, DEFAULT_REPLICAS);
        let max_batch_size = parse_or("SEARCH_MAX_BATCH_SIZE", &lookup, DEFAULT_MAX_BATCH_SIZE);
        let max_attempts = parse_or("SEARCH_BULK_MAX_ATTEMPTS", &lookup, DEFAULT_BULK_MAX_ATTEMPTS);
        let backoff_factor_ms = parse_or(
            "SEARCH_BULK_BACKOFF_FACTOR_MS",
            &lookup,
            DEFAULT_BULK_BACKOFF_FACTOR_MS,
        );

        let batch_sizes = match lookup("SEARCH_BATCH_SIZES") {
            Some(value) => parse_batch_sizes(&value)?,
            None => BTreeMap::new(),
        };

        let page_size = parse_or("SYNC_PAGE_SIZE", &lookup, DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(IndexingError::config("SYNC_PAGE_SIZE must be positive"));
        }

        let source_retry = SourceRetryConfig::default()
            .with_retry(
                parse_or("SYNC_SOURCE_MAX_ATTEMPTS", &lookup, DEFAULT_SOURCE_MAX_ATTEMPTS),
                parse_or(
                    "SYNC_SOURCE_BACKOFF_FACTOR_MS",
                    &lookup,
                    DEFAULT_SOURCE_BACKOFF_FACTOR_MS,
                ),
            )
            .with_call_timeout(Duration::from_secs(parse_or(
                "SYNC_SOURCE_TIMEOUT_SECS",
                &lookup,
                DEFAULT_SOURCE_TIMEOUT_SECS,
            )));

        Ok(Self {
            opensearch_url: lookup("OPENSEARCH_URL").unwrap_or(defaults.opensearch_url),
            index_prefix: lookup("SEARCH_INDEX_PREFIX").unwrap_or(defaults.index_prefix),
            connection_mode: ConnectionMode::parse(
                lookup("OPENSEARCH_CONNECTION_MODE").as_deref(),
            ),
            retry_interval: Duration::from_secs(parse_or(
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                &lookup,
                DEFAULT_RETRY_INTERVAL_SECS,
            )),
            request_timeout: Duration::from_secs(parse_or(
                "OPENSEARCH_REQUEST_TIMEOUT_SECS",
                &lookup,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            index_config: IndexConfig::new(shards, replicas),
            service_config: SearchIndexServiceConfig::with_max_batch_size(max_batch_size)
                .with_retry(max_attempts, backoff_factor_ms),
            batch_sizes,
            source_dir: lookup("SYNC_SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_dir),
            page_size,
            source_retry,
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

/// Parse `entity=size` pairs separated by commas.
pub fn parse_batch_sizes(value: &str) -> Result<BTreeMap<String, usize>, IndexingError> {
    let mut sizes = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (entity, size) = pair.split_once('=').ok_or_else(|| {
            IndexingError::config(format!("Invalid SEARCH_BATCH_SIZES entry '{}'", pair))
        })?;
        let size: usize = size.trim().parse().map_err(|_| {
            IndexingError::config(format!(
                "Invalid batch size in SEARCH_BATCH_SIZES entry '{}'",
                pair
            ))
        })?;
        if size == 0 {
            return Err(IndexingError::config(format!(
                "Batch size must be positive in SEARCH_BATCH_SIZES entry '{}'",
                pair
            )));
        }
        sizes.insert(entity.trim().to_string(), size);
    }
    Ok(sizes)
}
