//! The top-level scheduled ingestion loop.
//!
//! Drives repeated discovery → batching → dispatch → metadata-recording
//! cycles at a fixed interval. The loop is the service's fault-containment
//! boundary: a bad file, a transient network error, or a malformed feed
//! degrades one cycle, never the process. The only way out is the shutdown
//! token, polled cooperatively at iteration boundaries.

use async_trait::async_trait;
use snafu::prelude::*;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::batch::batch_files;
use crate::dispatch::Dispatcher;
use crate::emit;
use crate::error::{IngestError, IngestStorageSnafu};
use crate::metadata::MetadataQueue;
use crate::metrics::events::{
    BatchDispatched, DispatchStatus, FilesDiscovered, IterationCompleted,
};
use crate::storage::StorageProviderRef;

/// A secondary feed drained once per ingestion cycle.
///
/// The primary object-storage feed is built in; anything else (an event
/// stream, a vendor export) plugs in here. Paths it lands go through the
/// same metadata queue.
#[async_trait]
pub trait SecondaryFeed: Send {
    async fn ingest(&mut self, queue: &MetadataQueue) -> Result<(), IngestError>;
}

/// Loop lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    ShuttingDown,
    Stopped,
}

/// Counts for one ingestion iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterationStats {
    pub files_listed: usize,
    pub batches_dispatched: usize,
    pub dispatch_failures: usize,
}

/// The scheduled ingestion loop.
pub struct IngestionLoop {
    storage: StorageProviderRef,
    prefix: Option<String>,
    batch_threshold: u64,
    dispatcher: Dispatcher,
    queue: MetadataQueue,
    interval: Duration,
    shutdown: CancellationToken,
    secondary: Option<Box<dyn SecondaryFeed>>,
}

impl IngestionLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: StorageProviderRef,
        prefix: Option<String>,
        batch_threshold: u64,
        dispatcher: Dispatcher,
        queue: MetadataQueue,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            storage,
            prefix,
            batch_threshold,
            dispatcher,
            queue,
            interval,
            shutdown,
            secondary: None,
        }
    }

    /// Attach a secondary feed drained each cycle.
    pub fn with_secondary_feed(mut self, feed: Box<dyn SecondaryFeed>) -> Self {
        self.secondary = Some(feed);
        self
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// On shutdown the coordinator receives its sentinel so pending
    /// metadata work is flushed before the caller awaits the summary.
    pub async fn run(mut self) {
        info!(
            source = self.storage.url(),
            interval_secs = self.interval.as_secs(),
            "ingestion loop running"
        );

        let mut state = LoopState::Running;

        loop {
            match state {
                LoopState::Running => {
                    if self.shutdown.is_cancelled() {
                        state = LoopState::ShuttingDown;
                        continue;
                    }

                    let started = Instant::now();
                    match self.run_iteration().await {
                        Ok(stats) => {
                            info!(
                                files = stats.files_listed,
                                batches = stats.batches_dispatched,
                                dispatch_failures = stats.dispatch_failures,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "iteration complete"
                            );
                            emit!(IterationCompleted {
                                success: true,
                                duration: started.elapsed(),
                            });
                        }
                        Err(err) => {
                            // Contained here: the loop is rescheduled regardless.
                            error!(error = %err, "iteration failed");
                            emit!(IterationCompleted {
                                success: false,
                                duration: started.elapsed(),
                            });
                        }
                    }

                    if self.shutdown.is_cancelled() {
                        state = LoopState::ShuttingDown;
                        continue;
                    }

                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            state = LoopState::ShuttingDown;
                        }
                        _ = tokio::time::sleep(self.interval) => {}
                    }
                }
                LoopState::ShuttingDown => {
                    info!("shutdown requested, flushing metadata queue");
                    self.queue.shutdown();
                    state = LoopState::Stopped;
                }
                LoopState::Stopped => break,
            }
        }

        info!("ingestion loop stopped");
    }

    /// One discovery → batch → dispatch → record cycle.
    async fn run_iteration(&mut self) -> Result<IterationStats, IngestError> {
        // The listing is collected up front; batching stays lazy over it,
        // so dispatch still starts as soon as the first batch fills rather
        // than after all batches are formed.
        let files = self
            .storage
            .list_with_sizes(self.prefix.as_deref())
            .await
            .context(IngestStorageSnafu)?;

        let mut stats = IterationStats {
            files_listed: files.len(),
            ..Default::default()
        };
        emit!(FilesDiscovered {
            count: files.len() as u64,
        });

        for batch in batch_files(files, self.batch_threshold) {
            match self.dispatcher.dispatch(&batch).await {
                Ok(()) => {
                    stats.batches_dispatched += 1;
                    emit!(BatchDispatched {
                        feed_type: batch.feed_type().as_str(),
                        files: batch.len() as u64,
                        bytes: batch.total_bytes(),
                        status: DispatchStatus::Success,
                    });
                    // Durability lives in the metadata log, not the batch.
                    for file in batch.files() {
                        self.queue.record(file.path.clone());
                    }
                }
                Err(err) => {
                    stats.dispatch_failures += 1;
                    warn!(batch = %batch, error = %err, "batch dispatch failed");
                    emit!(BatchDispatched {
                        feed_type: batch.feed_type().as_str(),
                        files: batch.len() as u64,
                        bytes: batch.total_bytes(),
                        status: DispatchStatus::Failed,
                    });
                }
            }
        }

        if let Some(secondary) = &mut self.secondary {
            secondary.ingest(&self.queue).await?;
        }

        Ok(stats)
    }
}
