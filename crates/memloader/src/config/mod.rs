//! Configuration for the memloader batch loader.
//!
//! A YAML file is optional; every field has a default that reproduces the
//! classic four-store setup (`idfa`, `gaid`, `adid`, `dvid` on local ports
//! 33013-33016). CLI flags override the file.

mod cli;

pub use cli::CliArgs;

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

pub use memloader_core::config::{MetricsConfig, interpolate};

use memloader_core::error::{
    ConfigError, EmptyPatternSnafu, EmptyStoreAddressSnafu, EnvInterpolationSnafu,
    InvalidErrorRateSnafu, NoStoresSnafu, ReadFileSnafu, YamlParseSnafu, ZeroWorkersSnafu,
};

use crate::source::CompressionFormat;

/// Error rate above which a file is left for the next run.
pub const DEFAULT_MAX_ERROR_RATE: f64 = 0.01;

/// Default per-operation store timeout.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 3000;

/// Where input files come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Glob pattern for input files.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Compression format of input files.
    #[serde(default)]
    pub compression: CompressionFormat,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            compression: CompressionFormat::default(),
        }
    }
}

fn default_pattern() -> String {
    "data/*.tsv.gz".to_string()
}

/// One memcached store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// `host:port` of the server.
    pub address: String,
    /// Per-operation timeout in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

fn default_stores() -> IndexMap<String, StoreConfig> {
    [
        ("idfa", "127.0.0.1:33013"),
        ("gaid", "127.0.0.1:33014"),
        ("adid", "127.0.0.1:33015"),
        ("dvid", "127.0.0.1:33016"),
    ]
    .into_iter()
    .map(|(device_type, address)| (device_type.to_string(), StoreConfig::new(address)))
    .collect()
}

/// What to do when a record cannot be encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFailurePolicy {
    /// Stop the whole run.
    #[default]
    Abort,
    /// Count the line as an error and continue.
    Skip,
}

/// Error-rate gate and failure policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorHandlingConfig {
    /// Files whose error rate exceeds this are not marked complete.
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,
    #[serde(default)]
    pub on_encode_failure: EncodeFailurePolicy,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            max_error_rate: DEFAULT_MAX_ERROR_RATE,
            on_encode_failure: EncodeFailurePolicy::default(),
        }
    }
}

fn default_max_error_rate() -> f64 {
    DEFAULT_MAX_ERROR_RATE
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    /// Device type to store.
    #[serde(default = "default_stores")]
    pub stores: IndexMap<String, StoreConfig>,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    /// Log records instead of writing them.
    #[serde(default)]
    pub dry_run: bool,
    /// Whether a dry run still renames files that pass the error-rate gate.
    /// Marked files are skipped by later runs, including real ones.
    #[serde(default = "default_true")]
    pub dry_run_marks_files: bool,
    /// Files processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Prometheus endpoint; no HTTP server when absent.
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            stores: default_stores(),
            error_handling: ErrorHandlingConfig::default(),
            dry_run: false,
            dry_run_marks_files: true,
            workers: default_workers(),
            metrics: None,
        }
    }
}

impl Config {
    /// Whether committed files get the completion marker in this run.
    pub fn marks_files(&self) -> bool {
        !self.dry_run || self.dry_run_marks_files
    }

    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from YAML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let result = interpolate(contents);
        ensure!(
            result.is_ok(),
            EnvInterpolationSnafu {
                message: result.errors.join("\n"),
            }
        );

        let config: Config = serde_yaml::from_str(&result.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.pattern.trim().is_empty(), EmptyPatternSnafu);
        ensure!(!self.stores.is_empty(), NoStoresSnafu);
        for (device_type, store) in &self.stores {
            ensure!(
                !store.address.trim().is_empty(),
                EmptyStoreAddressSnafu { device_type }
            );
        }
        let rate = self.error_handling.max_error_rate;
        ensure!(
            (0.0..=1.0).contains(&rate),
            InvalidErrorRateSnafu { value: rate }
        );
        ensure!(self.workers > 0, ZeroWorkersSnafu);
        Ok(())
    }
}
