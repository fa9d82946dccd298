//! memloader: batch loader for gzipped device-install logs.
//!
//! This crate handles:
//! - Discovering pending input files and skipping ones already marked complete
//! - Parsing tab-separated install records and routing them by device type
//! - Encoding records as protobuf and writing them to memcached
//! - Per-file error-rate accounting that decides whether a file is marked done

pub mod config;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;

// Re-export commonly used items
pub use config::{CliArgs, Config};
pub use error::PipelineError;
pub use pipeline::{FilePipeline, FileReport, RunSummary, run_loader};

pub use memloader_core::{init_tracing, shutdown_signal};
