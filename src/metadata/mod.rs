//! Metadata coordination: the single writer to the metadata log.
//!
//! Any number of producer contexts discover files concurrently; all of them
//! funnel "file seen" notifications through a cheap cloneable queue handle
//! to one long-lived coordinator task. The coordinator owns the only write
//! connection to the store, which removes write contention and connection
//! storming without any in-process locking.
//!
//! A crash of the coordinator loses only its yet-unflushed queue contents,
//! never already durable metadata.

mod store;

pub use store::{MetadataStore, PostgresMetadataStore};

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::emit;
use crate::metrics::events::{InsertStatus, MetadataInsert};

/// Message accepted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataMessage {
    /// A newly discovered file path to record.
    Record(String),
    /// Sentinel: stop dequeuing and emit the final summary.
    Shutdown,
}

/// Cloneable producer handle onto the coordinator's queue.
#[derive(Debug, Clone)]
pub struct MetadataQueue {
    tx: mpsc::UnboundedSender<MetadataMessage>,
}

impl MetadataQueue {
    pub(crate) fn from_sender(tx: mpsc::UnboundedSender<MetadataMessage>) -> Self {
        Self { tx }
    }

    /// Enqueue a discovered path. A send failure means the coordinator is
    /// already gone; the path is logged and dropped.
    pub fn record(&self, path: impl Into<String>) {
        let path = path.into();
        if self.tx.send(MetadataMessage::Record(path.clone())).is_err() {
            warn!(path, "metadata coordinator gone, dropping path");
        }
    }

    /// Send the shutdown sentinel.
    pub fn shutdown(&self) {
        let _ = self.tx.send(MetadataMessage::Shutdown);
    }
}

/// Final counts reported by the coordinator on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub good_insert: u64,
    pub bad_insert: u64,
}

/// Coordinator run parameters.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Insert attempts per path before it is counted as failed.
    pub insert_retries: u32,
    /// Sleep between failed attempts, to ride out short-lived connectivity
    /// or lock contention without a full circuit breaker.
    pub retry_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            insert_retries: 3,
            retry_backoff: Duration::from_secs(15),
        }
    }
}

/// Spawn the coordinator task and return the producer handle.
///
/// The join handle resolves to the final insert summary once the shutdown
/// sentinel has been processed.
pub fn start_coordinator<S: MetadataStore>(
    store: S,
    config: CoordinatorConfig,
) -> (MetadataQueue, JoinHandle<WriterSummary>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_coordinator(store, rx, config));
    (MetadataQueue { tx }, handle)
}

/// Drain the queue, writing each path to the store with bounded retries.
///
/// An individual write failure never shuts the coordinator down; only the
/// sentinel (or all producer handles dropping) does.
async fn run_coordinator<S: MetadataStore>(
    store: S,
    mut rx: mpsc::UnboundedReceiver<MetadataMessage>,
    config: CoordinatorConfig,
) -> WriterSummary {
    info!(
        retries = config.insert_retries,
        backoff_secs = config.retry_backoff.as_secs(),
        "metadata coordinator started"
    );

    let mut summary = WriterSummary::default();

    while let Some(message) = rx.recv().await {
        let path = match message {
            MetadataMessage::Record(path) => path,
            MetadataMessage::Shutdown => break,
        };

        if insert_with_retries(&store, &path, &config).await {
            summary.good_insert += 1;
            emit!(MetadataInsert {
                status: InsertStatus::Success,
            });
        } else {
            summary.bad_insert += 1;
            emit!(MetadataInsert {
                status: InsertStatus::Failed,
            });
        }
    }

    info!(
        good_insert = summary.good_insert,
        bad_insert = summary.bad_insert,
        "metadata coordinator stopped"
    );
    summary
}

/// Attempt one idempotent insert, up to the configured retry count.
///
/// Returns true on success. Exhausting retries logs the path as a permanent
/// failure; it is never re-queued.
async fn insert_with_retries<S: MetadataStore>(
    store: &S,
    path: &str,
    config: &CoordinatorConfig,
) -> bool {
    for attempt in 1..=config.insert_retries {
        match store.insert_unprocessed(path).await {
            Ok(()) => {
                info!(path, attempt, "metadata record inserted");
                return true;
            }
            Err(err) if attempt == config.insert_retries => {
                error!(path, %err, "metadata insert failed after all retries");
            }
            Err(_) => {
                tokio::time::sleep(config.retry_backoff).await;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory store that fails a scripted number of leading attempts and
    /// enforces path uniqueness like the real table.
    #[derive(Default)]
    struct FlakyStore {
        paths: Mutex<HashSet<String>>,
        failures_remaining: Mutex<u32>,
        attempts: Mutex<u32>,
    }

    impl FlakyStore {
        fn failing(count: u32) -> Self {
            Self {
                failures_remaining: Mutex::new(count),
                ..Default::default()
            }
        }

        fn error() -> StoreError {
            StoreError::Connect {
                source: sqlx::Error::PoolClosed,
            }
        }
    }

    #[async_trait]
    impl MetadataStore for FlakyStore {
        async fn insert_unprocessed(&self, path: &str) -> Result<(), StoreError> {
            *self.attempts.lock().unwrap() += 1;
            {
                let mut remaining = self.failures_remaining.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Self::error());
                }
            }
            let mut paths = self.paths.lock().unwrap();
            if !paths.insert(path.to_string()) {
                // unique constraint violation
                return Err(Self::error());
            }
            Ok(())
        }
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            insert_retries: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_paths_written_and_summarized() {
        let (queue, handle) = start_coordinator(FlakyStore::default(), fast_config());

        queue.record("incoming/a.json.gz");
        queue.record("incoming/b.json.gz");
        queue.shutdown();

        let summary = handle.await.unwrap();
        assert_eq!(summary.good_insert, 2);
        assert_eq!(summary.bad_insert, 0);
    }

    #[tokio::test]
    async fn test_duplicate_path_counts_as_failed_insert() {
        let (queue, handle) = start_coordinator(FlakyStore::default(), fast_config());

        queue.record("incoming/a.json.gz");
        queue.record("incoming/a.json.gz");
        queue.shutdown();

        let summary = handle.await.unwrap();
        assert_eq!(summary.good_insert, 1);
        assert_eq!(summary.bad_insert, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers_within_retries() {
        let store = FlakyStore::failing(1);
        let config = CoordinatorConfig {
            insert_retries: 3,
            retry_backoff: Duration::from_secs(15),
        };
        let (queue, handle) = start_coordinator(store, config);

        queue.record("incoming/a.json.gz");
        queue.shutdown();

        let summary = handle.await.unwrap();
        assert_eq!(summary.good_insert, 1);
        assert_eq!(summary.bad_insert, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_is_not_fatal() {
        // Three failures exhaust all attempts for the first path; the
        // coordinator keeps going and the next path succeeds.
        let store = FlakyStore::failing(3);
        let (queue, handle) = start_coordinator(store, fast_config());

        queue.record("incoming/bad.json.gz");
        queue.record("incoming/good.json.gz");
        queue.shutdown();

        let summary = handle.await.unwrap();
        assert_eq!(summary.good_insert, 1);
        assert_eq!(summary.bad_insert, 1);
    }

    #[tokio::test]
    async fn test_sentinel_stops_dequeuing() {
        let (queue, handle) = start_coordinator(FlakyStore::default(), fast_config());

        queue.record("incoming/a.json.gz");
        queue.shutdown();
        // Anything enqueued after the sentinel is never written.
        queue.record("incoming/late.json.gz");

        let summary = handle.await.unwrap();
        assert_eq!(summary.good_insert, 1);
    }

    #[tokio::test]
    async fn test_all_handles_dropped_ends_coordinator() {
        let (queue, handle) = start_coordinator(FlakyStore::default(), fast_config());

        queue.record("incoming/a.json.gz");
        drop(queue);

        let summary = handle.await.unwrap();
        assert_eq!(summary.good_insert, 1);
    }
}
