//! Common error types for configuration loading and metrics setup.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Input pattern is empty.
    #[snafu(display("Source pattern cannot be empty"))]
    EmptyPattern,

    /// No stores configured.
    #[snafu(display("At least one store must be configured"))]
    NoStores,

    /// A store has no address.
    #[snafu(display("Store '{device_type}' has an empty address"))]
    EmptyStoreAddress { device_type: String },

    /// Error-rate threshold outside [0, 1].
    #[snafu(display("max_error_rate must be within [0, 1], got {value}"))]
    InvalidErrorRate { value: f64 },

    /// Worker count is zero.
    #[snafu(display("workers must be at least 1"))]
    ZeroWorkers,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics address could not be parsed.
    #[snafu(display("Invalid metrics address '{address}': {source}"))]
    AddressParse {
        address: String,
        source: std::net::AddrParseError,
    },

    /// Metrics already initialized.
    #[snafu(display("Metrics already initialized"))]
    AlreadyInitialized,

    /// Metrics not initialized.
    #[snafu(display("Metrics not initialized"))]
    NotInitialized,
}
