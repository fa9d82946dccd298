//! Internal events for memloader metrics emission.
//!
//! Each event struct represents a measurable occurrence in the loader.
//! Events implement `InternalEvent`, which records the matching Prometheus
//! metric. Per-line events are deliberately label-light: the file path is
//! never a label, device type only where the store is involved.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    fn emit(self);
}

/// Stage at which a line failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    Parse,
    Route,
    Encode,
    Write,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Parse => "parse",
            FailureStage::Route => "route",
            FailureStage::Encode => "encode",
            FailureStage::Write => "write",
        }
    }
}

/// Terminal status of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Committed,
    Retained,
    MarkFailed,
    StreamFailed,
    Unmarked,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Committed => "committed",
            FileStatus::Retained => "retained",
            FileStatus::MarkFailed => "mark_failed",
            FileStatus::StreamFailed => "stream_failed",
            FileStatus::Unmarked => "unmarked",
        }
    }
}

/// Result of a single store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Stored,
    Failed,
    DryRun,
}

impl WriteStatus {
    fn as_str(&self) -> &'static str {
        match self {
            WriteStatus::Stored => "stored",
            WriteStatus::Failed => "failed",
            WriteStatus::DryRun => "dry_run",
        }
    }
}

/// Event emitted once per input line, whatever its outcome.
pub struct LineProcessed;

impl InternalEvent for LineProcessed {
    fn emit(self) {
        counter!("memloader_lines_processed_total").increment(1);
    }
}

/// Event emitted when a line is counted as an error.
pub struct LineFailed {
    pub stage: FailureStage,
}

impl InternalEvent for LineFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "Line failed");
        counter!("memloader_line_failures_total", "stage" => self.stage.as_str()).increment(1);
    }
}

/// Event emitted after each store write attempt (or dry-run substitute).
pub struct StoreWrite {
    pub device_type: String,
    pub status: WriteStatus,
}

impl InternalEvent for StoreWrite {
    fn emit(self) {
        counter!(
            "memloader_store_writes_total",
            "device_type" => self.device_type,
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a store write round trip completes.
pub struct StoreWriteCompleted {
    pub device_type: String,
    pub duration: Duration,
}

impl InternalEvent for StoreWriteCompleted {
    fn emit(self) {
        histogram!("memloader_store_write_duration_seconds", "device_type" => self.device_type)
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when compressed bytes are read from an input file.
pub struct BytesRead {
    pub bytes: u64,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes read");
        counter!("memloader_bytes_read_total").increment(self.bytes);
    }
}

/// Event emitted when discovery finds pending files.
pub struct FilesDiscovered {
    pub count: u64,
}

impl InternalEvent for FilesDiscovered {
    fn emit(self) {
        trace!(count = self.count, "Files discovered");
        counter!("memloader_files_discovered_total").increment(self.count);
    }
}

/// Event emitted when a file reaches its terminal state.
pub struct FileProcessed {
    pub status: FileStatus,
    pub duration: Duration,
}

impl InternalEvent for FileProcessed {
    fn emit(self) {
        trace!(
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "File processed"
        );
        counter!("memloader_files_processed_total", "status" => self.status.as_str())
            .increment(1);
        histogram!("memloader_file_duration_seconds").record(self.duration.as_secs_f64());
    }
}
