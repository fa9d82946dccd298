//! File pipeline: discover, decompress, parse, write, decide.
//!
//! Each file moves through `Discovered -> Opened -> Streaming -> Decided`
//! and ends `Committed` or `Retained`. Failing to open a file or to start
//! decompressing it aborts the run. A stream that breaks part way through
//! retains that file only; per-line failures only feed the file's error rate.

mod gate;
mod tracker;

pub use gate::{Decision, FileCompletionGate, FileOutcome, mark_complete, marked_path};
pub use tracker::{ErrorRateTracker, FailureStats, FileStats, LineOutcome, PROGRESS_INTERVAL};

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::{StreamExt, TryStreamExt, stream};
use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use memloader_core::error::AddressParseSnafu;
use memloader_core::metrics::events::{FailureStage, FileProcessed, FilesDiscovered};
use memloader_core::{emit, init_metrics, shutdown_signal};

use crate::config::{Config, EncodeFailurePolicy};
use crate::error::{PipelineError, SourceError};
use crate::sink::{StoreRegistry, StoreWriter};
use crate::source::{CompressionFormat, RecordParser, list_pending_files, spawn_line_reader};

/// Everything known about a file once its decision is carried out.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub stats: FileStats,
    pub outcome: FileOutcome,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub files_committed: usize,
    /// Files left for the next run, including ones whose stream broke.
    pub files_retained: usize,
    pub files_mark_failed: usize,
    /// Files that passed the gate but were left unmarked by a dry run.
    pub files_unmarked: usize,
    /// Files not started because shutdown was requested.
    pub files_skipped: usize,
    pub lines_processed: u64,
    pub line_errors: u64,
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    fn record(&mut self, report: FileReport) {
        match report.outcome {
            FileOutcome::Committed { .. } => self.files_committed += 1,
            FileOutcome::Retained | FileOutcome::StreamFailed => self.files_retained += 1,
            FileOutcome::MarkFailed => self.files_mark_failed += 1,
            FileOutcome::Unmarked => self.files_unmarked += 1,
        }
        self.lines_processed += report.stats.processed;
        self.line_errors += report.stats.errors;
        self.reports.push(report);
    }
}

/// Loads every pending file matching the input pattern.
pub struct FilePipeline {
    pattern: String,
    compression: CompressionFormat,
    parser: RecordParser,
    registry: StoreRegistry,
    writer: StoreWriter,
    gate: FileCompletionGate,
    on_encode_failure: EncodeFailurePolicy,
    workers: usize,
    shutdown: CancellationToken,
}

impl FilePipeline {
    /// Build a pipeline that writes to `registry`'s stores.
    pub fn new(config: &Config, registry: StoreRegistry) -> Self {
        let gate = FileCompletionGate::new(config.error_handling.max_error_rate);
        Self {
            pattern: config.source.pattern.clone(),
            compression: config.source.compression,
            parser: RecordParser,
            registry,
            writer: StoreWriter::protobuf(config.dry_run),
            gate: if config.marks_files() {
                gate
            } else {
                gate.without_marking()
            },
            on_encode_failure: config.error_handling.on_encode_failure,
            workers: config.workers.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the record writer (custom encoder, dry-run toggle).
    pub fn with_writer(mut self, writer: StoreWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Stop starting new files once `shutdown` is cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn writer(&self) -> &StoreWriter {
        &self.writer
    }

    /// Process every pending file. Stops at the first fatal error.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let files = list_pending_files(&self.pattern)?;
        emit!(FilesDiscovered {
            count: files.len() as u64
        });
        info!(
            pattern = %self.pattern,
            files = files.len(),
            workers = self.workers,
            dry_run = self.writer.is_dry_run(),
            "Found files to process"
        );
        if self.writer.is_dry_run() && self.gate.marks_files() {
            warn!("Dry run still marks passing files complete, later runs will skip them");
        }

        let mut summary = RunSummary::default();
        let mut reports = stream::iter(files)
            .map(|path| self.process_file(path))
            .buffered(self.workers);

        while let Some(report) = reports.try_next().await? {
            match report {
                Some(report) => summary.record(report),
                None => summary.files_skipped += 1,
            }
        }

        info!(
            committed = summary.files_committed,
            retained = summary.files_retained,
            mark_failed = summary.files_mark_failed,
            unmarked = summary.files_unmarked,
            skipped = summary.files_skipped,
            lines = summary.lines_processed,
            errors = summary.line_errors,
            "Run complete"
        );
        Ok(summary)
    }

    /// Load one file and commit or retain it.
    ///
    /// Returns `None` if shutdown was requested before the file started.
    pub async fn process_file(&self, path: PathBuf) -> Result<Option<FileReport>, PipelineError> {
        if self.shutdown.is_cancelled() {
            debug!(file = %path.display(), "Shutdown requested, not starting file");
            return Ok(None);
        }

        let started = Instant::now();
        info!(file = %path.display(), "Processing file");

        let mut batches = spawn_line_reader(path.clone(), self.compression);
        let mut tracker = ErrorRateTracker::new(&path);
        let mut stream_error = None;
        while let Some(batch) = batches.recv().await {
            match batch {
                Ok(lines) => {
                    for line in &lines {
                        tracker.record(self.process_line(&path, line).await?);
                    }
                }
                Err(e @ SourceError::Stream { .. }) => {
                    stream_error = Some(e);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let stats = tracker.finish();
        info!(
            file = %path.display(),
            processed = stats.processed,
            errors = stats.errors,
            parse_errors = stats.failures.parse,
            route_errors = stats.failures.route,
            write_errors = stats.failures.write,
            error_rate = %format!("{:.4}", stats.error_rate),
            "Finished reading file"
        );

        let outcome = match stream_error {
            Some(e) => {
                error!(
                    file = %path.display(),
                    error = %e,
                    processed = stats.processed,
                    "Input stream broke, leaving file for the next run"
                );
                FileOutcome::StreamFailed
            }
            None => {
                let decision = self.gate.decide(stats.error_rate);
                self.gate.apply(&path, stats.error_rate, decision).await
            }
        };
        emit!(FileProcessed {
            status: outcome.status(),
            duration: started.elapsed(),
        });

        Ok(Some(FileReport {
            path,
            stats,
            outcome,
        }))
    }

    /// Parse, route and write one line.
    async fn process_line(&self, path: &Path, line: &[u8]) -> Result<LineOutcome, PipelineError> {
        let record = match self.parser.parse_bytes(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    file = %path.display(),
                    error = %e,
                    line = %String::from_utf8_lossy(line),
                    "Skipping invalid line"
                );
                return Ok(LineOutcome::Failure(FailureStage::Parse));
            }
        };

        let store = match self.registry.route(&record.device_type) {
            Ok(store) => store,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unroutable record");
                return Ok(LineOutcome::Failure(FailureStage::Route));
            }
        };

        let key = record.key();
        match self.writer.write(store, &key, &record).await {
            Ok(true) => Ok(LineOutcome::Success),
            Ok(false) => Ok(LineOutcome::Failure(FailureStage::Write)),
            Err(source) => match self.on_encode_failure {
                EncodeFailurePolicy::Abort => Err(PipelineError::Encoding {
                    path: path.to_path_buf(),
                    source,
                }),
                EncodeFailurePolicy::Skip => {
                    warn!(file = %path.display(), error = %source, "Skipping unencodable record");
                    Ok(LineOutcome::Failure(FailureStage::Encode))
                }
            },
        }
    }
}

/// Run the loader described by `config` against its memcached stores.
///
/// Installs the metrics recorder (and HTTP endpoint when configured) and a
/// signal handler that stops new files from starting.
pub async fn run_loader(config: &Config) -> Result<RunSummary, PipelineError> {
    let metrics_addr: Option<SocketAddr> = match &config.metrics {
        Some(metrics) => Some(
            metrics
                .address
                .parse()
                .context(AddressParseSnafu {
                    address: &metrics.address,
                })?,
        ),
        None => None,
    };
    init_metrics(metrics_addr)?;

    let registry = StoreRegistry::from_config(&config.stores);
    info!(stores = ?registry, "Store registry ready");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, finishing files in progress");
        signal_token.cancel();
    });

    FilePipeline::new(config, registry)
        .with_shutdown(shutdown)
        .run()
        .await
}
