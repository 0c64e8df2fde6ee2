//! headway: batching and dispatch for landed transit feed files.
//!
//! This library provides the components behind the ingestion service:
//! discovery of feed files in an incoming bucket, grouping them into size-
//! and type-bounded batches, dispatching each batch to an external
//! conversion function, and durably recording every seen file exactly once
//! through a single-writer metadata coordinator.
//!
//! # Example
//!
//! ```ignore
//! use headway::{Config, run_ingestion, error::IngestError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), IngestError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let summary = run_ingestion(config).await?;
//!     println!("Recorded {} files", summary.good_insert);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod metadata;
pub mod metrics;
pub mod pipeline;
pub mod signal;
pub mod storage;

// Re-export main types
pub use batch::{Batch, CompressedPathSet, batch_files, compress, decompress};
pub use config::Config;
pub use dispatch::{Dispatcher, HttpInvokeClient, InvokeClient, MockInvokeClient};
pub use feed::FeedType;
pub use metadata::{MetadataQueue, MetadataStore, WriterSummary, start_coordinator};
pub use pipeline::{IngestionLoop, SecondaryFeed};
pub use storage::{StorageProvider, StorageProviderRef};

use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use error::{IngestError, IngestStorageSnafu, StoreSnafu, TaskJoinSnafu};
use metadata::{CoordinatorConfig, PostgresMetadataStore};

/// Run the full ingestion service until a shutdown signal arrives.
///
/// Wires the storage provider, dispatcher, metadata coordinator, and loop
/// together from configuration, then returns the coordinator's final insert
/// summary once shutdown completes.
pub async fn run_ingestion(config: Config) -> Result<WriterSummary, IngestError> {
    let storage = Arc::new(
        StorageProvider::for_url_with_options(
            &config.source.url,
            config.source.storage_options.clone(),
        )
        .await
        .context(IngestStorageSnafu)?,
    );

    let store = PostgresMetadataStore::connect(&config.metadata.database_url)
        .await
        .context(StoreSnafu)?;

    let (queue, coordinator) = start_coordinator(
        store,
        CoordinatorConfig {
            insert_retries: config.metadata.insert_retries,
            retry_backoff: config.retry_backoff(),
        },
    );

    let client = Arc::new(HttpInvokeClient::new(Duration::from_secs(
        config.dispatch.timeout_secs,
    )));
    let dispatcher = Dispatcher::new(&config.dispatch, client);

    let shutdown = signal::shutdown_token();

    let ingestion = IngestionLoop::new(
        storage,
        config.source.prefix.clone(),
        config.source.batch_threshold,
        dispatcher,
        queue,
        config.poll_interval(),
        shutdown,
    );

    ingestion.run().await;

    coordinator.await.context(TaskJoinSnafu)
}
