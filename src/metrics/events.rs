//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the ingestion
//! service. Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when landed files are discovered by a listing.
pub struct FilesDiscovered {
    pub count: u64,
}

impl InternalEvent for FilesDiscovered {
    fn emit(self) {
        trace!(count = self.count, "Files discovered");
        counter!("headway_files_discovered_total").increment(self.count);
    }
}

/// Event emitted when a file is skipped as unclassifiable.
pub struct FileSkipped;

impl InternalEvent for FileSkipped {
    fn emit(self) {
        counter!("headway_files_skipped_total").increment(1);
    }
}

/// Outcome of a batch dispatch.
#[derive(Debug, Clone, Copy)]
pub enum DispatchStatus {
    Success,
    Failed,
}

impl DispatchStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Success => "success",
            DispatchStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a batch dispatch completes.
pub struct BatchDispatched {
    pub feed_type: &'static str,
    pub files: u64,
    pub bytes: u64,
    pub status: DispatchStatus,
}

impl InternalEvent for BatchDispatched {
    fn emit(self) {
        trace!(
            feed_type = self.feed_type,
            files = self.files,
            status = self.status.as_str(),
            "Batch dispatched"
        );
        counter!("headway_batches_dispatched_total",
            "feed_type" => self.feed_type, "status" => self.status.as_str())
        .increment(1);
        if matches!(self.status, DispatchStatus::Success) {
            counter!("headway_files_dispatched_total", "feed_type" => self.feed_type)
                .increment(self.files);
            counter!("headway_bytes_dispatched_total", "feed_type" => self.feed_type)
                .increment(self.bytes);
        }
    }
}

/// Outcome of a metadata insert, after retries.
#[derive(Debug, Clone, Copy)]
pub enum InsertStatus {
    Success,
    Failed,
}

impl InsertStatus {
    fn as_str(&self) -> &'static str {
        match self {
            InsertStatus::Success => "success",
            InsertStatus::Failed => "failed",
        }
    }
}

/// Event emitted when the coordinator finishes an insert attempt chain.
pub struct MetadataInsert {
    pub status: InsertStatus,
}

impl InternalEvent for MetadataInsert {
    fn emit(self) {
        counter!("headway_metadata_inserts_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted at the end of each ingestion iteration.
pub struct IterationCompleted {
    pub success: bool,
    pub duration: Duration,
}

impl InternalEvent for IterationCompleted {
    fn emit(self) {
        let status = if self.success { "success" } else { "failed" };
        counter!("headway_iterations_total", "status" => status).increment(1);
        histogram!("headway_iteration_duration_seconds").record(self.duration.as_secs_f64());
    }
}
