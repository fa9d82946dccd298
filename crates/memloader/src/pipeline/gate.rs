//! Commit-or-retain decision for a fully read file.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use memloader_core::metrics::events::FileStatus;

use crate::source::COMPLETION_MARKER;

/// Whether a file may be treated as consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Commit,
    Retain,
}

/// What actually happened to the file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Renamed with the completion marker.
    Committed { marked_path: PathBuf },
    /// Left untouched for a full retry on a later run.
    Retained,
    /// Commit was decided but the rename failed; the file will be retried.
    MarkFailed,
    /// Decompression failed part way through; never committed.
    StreamFailed,
    /// Commit was decided but marking is disabled for this run.
    Unmarked,
}

impl FileOutcome {
    pub fn status(&self) -> FileStatus {
        match self {
            FileOutcome::Committed { .. } => FileStatus::Committed,
            FileOutcome::Retained => FileStatus::Retained,
            FileOutcome::MarkFailed => FileStatus::MarkFailed,
            FileOutcome::StreamFailed => FileStatus::StreamFailed,
            FileOutcome::Unmarked => FileStatus::Unmarked,
        }
    }
}

/// Compares a file's final error rate with the threshold.
#[derive(Debug, Clone, Copy)]
pub struct FileCompletionGate {
    threshold: f64,
    mark_files: bool,
}

impl FileCompletionGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            mark_files: true,
        }
    }

    /// Decide as usual but never rename committed files.
    pub fn without_marking(self) -> Self {
        Self {
            mark_files: false,
            ..self
        }
    }

    pub fn marks_files(&self) -> bool {
        self.mark_files
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Commit iff `rate <= threshold`.
    pub fn decide(&self, rate: f64) -> Decision {
        if rate <= self.threshold {
            Decision::Commit
        } else {
            Decision::Retain
        }
    }

    /// Carry out `decision` for `path`.
    pub async fn apply(&self, path: &Path, rate: f64, decision: Decision) -> FileOutcome {
        match decision {
            Decision::Retain => {
                warn!(
                    file = %path.display(),
                    error_rate = rate,
                    threshold = self.threshold,
                    "Error rate too high, leaving file for the next run"
                );
                FileOutcome::Retained
            }
            Decision::Commit if !self.mark_files => {
                info!(
                    file = %path.display(),
                    error_rate = rate,
                    "Would mark file complete, leaving it unmarked"
                );
                FileOutcome::Unmarked
            }
            Decision::Commit => match mark_complete(path).await {
                Ok(marked_path) => {
                    info!(
                        file = %path.display(),
                        marked = %marked_path.display(),
                        error_rate = rate,
                        "Marked file complete"
                    );
                    FileOutcome::Committed { marked_path }
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Failed to mark file complete");
                    FileOutcome::MarkFailed
                }
            },
        }
    }
}

/// `<dir>/<name>` becomes `<dir>/.<name>`.
pub fn marked_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let mut marked = OsString::from(COMPLETION_MARKER.to_string());
    marked.push(name);
    Some(path.with_file_name(marked))
}

/// Rename `path` to carry the completion marker.
pub async fn mark_complete(path: &Path) -> io::Result<PathBuf> {
    let target = marked_path(path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        )
    })?;
    tokio::fs::rename(path, &target).await?;
    Ok(target)
}
