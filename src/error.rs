//! Error types for headway using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source URL is empty.
    #[snafu(display("Source url cannot be empty"))]
    EmptySourceUrl,

    /// A batch threshold of zero would never yield a batch.
    #[snafu(display("Batch threshold must be greater than zero"))]
    ZeroBatchThreshold,

    /// Metadata database URL is empty.
    #[snafu(display("Metadata database url cannot be empty"))]
    EmptyDatabaseUrl,

    /// Zero insert retries would fail every path without an attempt.
    #[snafu(display("Insert retries must be greater than zero"))]
    ZeroInsertRetries,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Feed Errors ============

/// Errors that can occur while classifying landed feed files.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum FeedError {
    /// File name matches no known feed type pattern.
    #[snafu(display("No feed type matches filename: {filename}"))]
    Unclassifiable { filename: String },
}

// ============ Dispatch Errors ============

/// Errors that can occur when dispatching a batch for conversion.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DispatchError {
    /// The conversion function endpoint is not configured.
    #[snafu(display("Conversion function url is not configured"))]
    MissingFunctionUrl,

    /// The invocation call to the external system failed.
    #[snafu(display("Failed to invoke conversion function for {feed_type}"))]
    Invocation {
        feed_type: String,
        source: reqwest::Error,
    },

    /// Failed to serialize the dispatch payload.
    #[snafu(display("Failed to serialize dispatch payload"))]
    PayloadSerialize { source: serde_json::Error },
}

impl DispatchError {
    /// Configuration errors are permanent; retrying the same call cannot help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DispatchError::MissingFunctionUrl)
    }
}

// ============ Metadata Store Errors ============

/// Errors that can occur writing to the metadata log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// Failed to connect to the metadata database.
    #[snafu(display("Failed to connect to metadata database"))]
    Connect { source: sqlx::Error },

    /// Metadata insert failed.
    #[snafu(display("Failed to insert metadata record for {path}"))]
    Insert { path: String, source: sqlx::Error },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Ingest Error (top-level) ============

/// Top-level ingestion errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// Storage error.
    #[snafu(display("Storage error"))]
    IngestStorage { source: StorageError },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Dispatch error.
    #[snafu(display("Dispatch error"))]
    Dispatch { source: DispatchError },

    /// Metadata store error.
    #[snafu(display("Metadata store error"))]
    Store { source: StoreError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// The metadata coordinator channel closed unexpectedly.
    #[snafu(display("Metadata queue closed unexpectedly"))]
    QueueClosed,

    /// Task join error.
    #[snafu(display("Task join error"))]
    TaskJoin { source: tokio::task::JoinError },
}
