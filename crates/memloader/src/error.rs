//! Error types for the memloader batch loader.
//!
//! Per-line errors (`ParseError`, `RoutingError`, `WriteError`) are absorbed
//! into a file's error rate. `PipelineError` is what ends a run.

use std::path::PathBuf;

use snafu::prelude::*;

pub use memloader_core::error::{ConfigError, MetricsError};

/// Why a single input line could not be turned into a record.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub))]
pub enum ParseError {
    /// Line does not have exactly five tab-separated fields.
    #[snafu(display("Expected 5 tab-separated fields, found {fields}"))]
    MalformedLine { fields: usize },

    /// Latitude is not a finite number.
    #[snafu(display("Invalid latitude '{value}'"))]
    BadLatitude { value: String },

    /// Longitude is not a finite number.
    #[snafu(display("Invalid longitude '{value}'"))]
    BadLongitude { value: String },

    /// Line bytes are not valid UTF-8.
    #[snafu(display("Line is not valid UTF-8"))]
    InvalidEncoding,
}

/// Failure to find a store for a record.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub))]
pub enum RoutingError {
    /// No store is registered for this device type.
    #[snafu(display("No store registered for device type '{device_type}'"))]
    UnknownDeviceType { device_type: String },
}

/// Failure to serialize (or, in dry-run, re-read) a record.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EncodingError {
    /// Protobuf encoding failed.
    #[snafu(display("Failed to encode record for {key}: {source}"))]
    Encode {
        key: String,
        source: prost::EncodeError,
    },

    /// Encoded bytes could not be decoded back.
    #[snafu(display("Failed to decode record for {key}: {source}"))]
    Decode {
        key: String,
        source: prost::DecodeError,
    },
}

/// Failure to put a value into a store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// Could not connect to the store.
    #[snafu(display("Failed to connect to {address}: {source}"))]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// I/O failure on an established connection.
    #[snafu(display("I/O error talking to {address}: {source}"))]
    Io {
        address: String,
        source: std::io::Error,
    },

    /// The operation did not finish in time.
    #[snafu(display("Timed out after {timeout_ms}ms talking to {address}"))]
    Timeout { address: String, timeout_ms: u64 },

    /// The store answered with something other than success.
    #[snafu(display("{address} rejected write: {reply}"))]
    Rejected { address: String, reply: String },

    /// Key cannot be sent over the store protocol.
    #[snafu(display("Key '{key}' is not a valid store key"))]
    InvalidKey { key: String },

    /// Connection closed before a reply arrived.
    #[snafu(display("{address} closed the connection"))]
    ConnectionClosed { address: String },
}

/// Error returned by a decompression codec.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecompressionError {
    /// Input does not start with the codec's magic bytes.
    #[snafu(display("Not a {codec} stream"))]
    BadHeader { codec: &'static str },

    /// Decoder could not be constructed.
    #[snafu(display("Failed to create {codec} decoder: {source}"))]
    DecoderInit {
        codec: &'static str,
        source: std::io::Error,
    },
}

/// Errors while discovering and opening input files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Glob pattern syntax is invalid.
    #[snafu(display("Invalid input pattern '{pattern}': {source}"))]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// Input file could not be opened or read.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Decompression could not be initialized.
    #[snafu(display("Failed to open {} for decompression: {source}", path.display()))]
    Decompression {
        path: PathBuf,
        source: DecompressionError,
    },

    /// Decompressed stream failed part way through.
    #[snafu(display("Failed reading decompressed stream of {}: {source}", path.display()))]
    Stream {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level errors that abort a run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Input discovery or read error.
    #[snafu(display("Source error: {source}"))]
    Source { source: SourceError },

    /// Record encoding failed under the abort policy.
    #[snafu(display("Encoding error in {}: {source}", path.display()))]
    Encoding {
        path: PathBuf,
        source: EncodingError,
    },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<SourceError> for PipelineError {
    fn from(source: SourceError) -> Self {
        PipelineError::Source { source }
    }
}

impl From<MetricsError> for PipelineError {
    fn from(source: MetricsError) -> Self {
        PipelineError::Metrics { source }
    }
}
