//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files with environment variable
//! interpolation, and validates the values the ingestion loop depends on.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{
    ConfigError, EmptyDatabaseUrlSnafu, EmptySourceUrlSnafu, EnvInterpolationSnafu, ReadFileSnafu,
    YamlParseSnafu, ZeroBatchThresholdSnafu, ZeroInsertRetriesSnafu,
};

/// Main configuration structure for the ingestion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    /// Dispatch configuration (optional; absence fails at dispatch time).
    #[serde(default)]
    pub dispatch: DispatchConfig,
    pub metadata: MetadataConfig,
    /// Metrics configuration (optional, enabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Source configuration for discovering landed feed files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Storage URL of the incoming bucket.
    /// Examples: "s3://mbta-gtfs-incoming", "/local/landing/dir"
    pub url: String,

    /// Key prefix to list under (default: none, lists the whole bucket).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,

    /// Upper bound on the raw byte sum of one batch (default: 100000).
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: u64,

    /// Seconds between ingestion iterations (default: 30).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Dispatch configuration for the external conversion function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// URL of the conversion function. Missing at dispatch time is a
    /// non-retryable configuration error.
    #[serde(default)]
    pub function_url: Option<String>,

    /// Per-invocation request timeout in seconds (default: 30).
    #[serde(default = "default_dispatch_timeout_secs")]
    pub timeout_secs: u64,
}

/// Metadata store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Postgres connection URL for the metadata log.
    pub database_url: String,

    /// Insert attempts per path before counting it as failed (default: 3).
    #[serde(default = "default_insert_retries")]
    pub insert_retries: u32,

    /// Seconds to wait between failed insert attempts (default: 15).
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_batch_threshold() -> u64 {
    100_000
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_dispatch_timeout_secs() -> u64 {
    30
}

fn default_insert_retries() -> u32 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    15
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file with env var interpolation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).context(ReadFileSnafu)?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = vars::interpolate(raw);
        ensure!(
            interpolated.is_ok(),
            EnvInterpolationSnafu {
                message: interpolated.errors.join("\n"),
            }
        );

        let config: Config = serde_yaml::from_str(&interpolated.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.url.is_empty(), EmptySourceUrlSnafu);
        ensure!(self.source.batch_threshold > 0, ZeroBatchThresholdSnafu);
        ensure!(
            !self.metadata.database_url.is_empty(),
            EmptyDatabaseUrlSnafu
        );
        ensure!(self.metadata.insert_retries > 0, ZeroInsertRetriesSnafu);
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.source.poll_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.metadata.retry_backoff_secs)
    }
}
