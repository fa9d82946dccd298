//! Per-file error-rate accounting.

use std::path::{Path, PathBuf};

use tracing::info;

use memloader_core::emit;
use memloader_core::metrics::events::{FailureStage, LineFailed, LineProcessed};

/// A progress line is logged every this many processed lines.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Result of pushing one line through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Success,
    Failure(FailureStage),
}

/// Failure counts by stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureStats {
    pub parse: u64,
    pub route: u64,
    pub encode: u64,
    pub write: u64,
}

impl FailureStats {
    pub fn increment(&mut self, stage: FailureStage) {
        match stage {
            FailureStage::Parse => self.parse += 1,
            FailureStage::Route => self.route += 1,
            FailureStage::Encode => self.encode += 1,
            FailureStage::Write => self.write += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.parse + self.route + self.encode + self.write
    }
}

/// Final counts for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    pub processed: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub failures: FailureStats,
}

/// Counts processed lines and failures for a single file.
///
/// Every line counts as processed; every failure class counts as an error.
pub struct ErrorRateTracker {
    path: PathBuf,
    processed: u64,
    errors: u64,
    failures: FailureStats,
}

impl ErrorRateTracker {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            processed: 0,
            errors: 0,
            failures: FailureStats::default(),
        }
    }

    pub fn record(&mut self, outcome: LineOutcome) {
        self.processed += 1;
        emit!(LineProcessed);

        if let LineOutcome::Failure(stage) = outcome {
            self.errors += 1;
            self.failures.increment(stage);
            emit!(LineFailed { stage });
        }

        if self.processed % PROGRESS_INTERVAL == 0 {
            info!(
                file = %self.path.display(),
                processed = self.processed,
                error_rate = %format!("{:.4}", self.rate()),
                "Progress"
            );
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// `errors / processed`, or `0.0` before any line was seen.
    pub fn rate(&self) -> f64 {
        error_rate(self.errors, self.processed)
    }

    pub fn finish(self) -> FileStats {
        FileStats {
            processed: self.processed,
            errors: self.errors,
            error_rate: self.rate(),
            failures: self.failures,
        }
    }
}

fn error_rate(errors: u64, processed: u64) -> f64 {
    if processed == 0 {
        0.0
    } else {
        errors as f64 / processed as f64
    }
}
