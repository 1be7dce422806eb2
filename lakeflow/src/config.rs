//! Environment-derived configuration.
//!
//! Settings are resolved once, into an immutable value passed into the
//! orchestrators and handles; component logic never reads the
//! environment itself.

use chrono::Utc;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::pipeline::RetryPolicy;

const ENV_REGION: &str = "LAKE_REGION";
const ENV_BUCKET: &str = "LAKE_BUCKET";
const ENV_DATABASE: &str = "LAKE_DATABASE";
const ENV_TABLE: &str = "LAKE_TABLE";
const ENV_WORKGROUP: &str = "LAKE_WORKGROUP";
const ENV_API_ENDPOINT: &str = "LAKE_API_ENDPOINT";
const ENV_API_KEY: &str = "LAKE_API_KEY";
const ENV_CLUSTER: &str = "LAKE_CLUSTER";
const ENV_TOPIC: &str = "LAKE_TOPIC";
const ENV_RETRY_ATTEMPTS: &str = "LAKE_RETRY_ATTEMPTS";
const ENV_RETRY_DELAY_SECS: &str = "LAKE_RETRY_DELAY_SECS";
const ENV_STABILIZATION_WAIT_SECS: &str = "LAKE_STABILIZATION_WAIT_SECS";

/// Immutable process-wide configuration.
#[derive(Debug, Clone)]
pub struct LakeConfig {
    /// Cloud region for every regional resource.
    pub region: String,
    /// Storage bucket name. Generated with a time-based suffix when
    /// not set in the environment.
    pub bucket: String,
    /// Catalog database name.
    pub database: String,
    /// Catalog table name for ingested records.
    pub table: String,
    /// Query workgroup name.
    pub workgroup: String,
    /// Key prefix for ingested raw data.
    pub raw_prefix: String,
    /// Key prefix for query results.
    pub results_prefix: String,
    /// Upstream data API endpoint, when configured.
    pub api_endpoint: Option<String>,
    /// Upstream data API subscription key, when configured.
    pub api_key: Option<String>,
    /// Compute cluster name for the media pipeline.
    pub cluster: String,
    /// Notification topic.
    pub topic: String,
    /// Retry budget applied to pipeline stages.
    pub retry: RetryPolicy,
    /// Stabilization wait inserted after stages that create remote
    /// resources other stages depend on.
    pub stabilization_wait: Duration,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            bucket: generated_bucket_name(),
            database: "lake_analytics".to_string(),
            table: "player_stats".to_string(),
            workgroup: "analytics_workgroup".to_string(),
            raw_prefix: "raw-data/".to_string(),
            results_prefix: "athena-query-results/".to_string(),
            api_endpoint: None,
            api_key: None,
            cluster: "media-processing".to_string(),
            topic: "lake-events".to_string(),
            retry: RetryPolicy::default(),
            stabilization_wait: Duration::from_secs(60),
        }
    }
}

fn generated_bucket_name() -> String {
    format!("analytics-data-lake-{}", Utc::now().timestamp())
}

fn string_var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

impl LakeConfig {
    /// Creates a configuration with defaults and a generated bucket
    /// name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves configuration from the environment.
    ///
    /// Recognized variables, all optional:
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LAKE_REGION` | `us-east-1` |
    /// | `LAKE_BUCKET` | `analytics-data-lake-<unix-time>` |
    /// | `LAKE_DATABASE` | `lake_analytics` |
    /// | `LAKE_TABLE` | `player_stats` |
    /// | `LAKE_WORKGROUP` | `analytics_workgroup` |
    /// | `LAKE_API_ENDPOINT` | unset |
    /// | `LAKE_API_KEY` | unset |
    /// | `LAKE_CLUSTER` | `media-processing` |
    /// | `LAKE_TOPIC` | `lake-events` |
    /// | `LAKE_RETRY_ATTEMPTS` | `3` |
    /// | `LAKE_RETRY_DELAY_SECS` | `30` |
    /// | `LAKE_STABILIZATION_WAIT_SECS` | `60` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_attempts = parsed_var(ENV_RETRY_ATTEMPTS, defaults.retry.max_attempts)?;
        let delay_secs = parsed_var(ENV_RETRY_DELAY_SECS, defaults.retry.delay.as_secs())?;
        let wait_secs = parsed_var(
            ENV_STABILIZATION_WAIT_SECS,
            defaults.stabilization_wait.as_secs(),
        )?;

        Ok(Self {
            region: string_var(ENV_REGION, &defaults.region),
            bucket: string_var(ENV_BUCKET, &defaults.bucket),
            database: string_var(ENV_DATABASE, &defaults.database),
            table: string_var(ENV_TABLE, &defaults.table),
            workgroup: string_var(ENV_WORKGROUP, &defaults.workgroup),
            api_endpoint: optional_var(ENV_API_ENDPOINT),
            api_key: optional_var(ENV_API_KEY),
            cluster: string_var(ENV_CLUSTER, &defaults.cluster),
            topic: string_var(ENV_TOPIC, &defaults.topic),
            retry: RetryPolicy::new(max_attempts, Duration::from_secs(delay_secs)),
            stabilization_wait: Duration::from_secs(wait_secs),
            ..defaults
        })
    }

    /// Sets the bucket name.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the workgroup name.
    #[must_use]
    pub fn with_workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = workgroup.into();
        self
    }

    /// Sets the upstream API endpoint.
    #[must_use]
    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the stage retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the stabilization wait.
    #[must_use]
    pub fn with_stabilization_wait(mut self, wait: Duration) -> Self {
        self.stabilization_wait = wait;
        self
    }

    /// The query-results output location URI.
    #[must_use]
    pub fn output_location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.results_prefix)
    }

    /// The raw-data location URI the catalog table points at.
    #[must_use]
    pub fn raw_data_location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.raw_prefix)
    }
}
