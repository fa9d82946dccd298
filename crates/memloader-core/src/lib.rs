//! memloader-core: Shared infrastructure for the memloader batch loader.
//!
//! - `config/` - Common configuration types and environment variable interpolation
//! - `metrics/` - Prometheus metrics infrastructure and internal events
//! - `signal` - Signal handling for graceful shutdown
//! - `tracing` - Subscriber initialization
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod tracing;

pub use config::{InterpolationResult, MetricsConfig, interpolate};
pub use error::{ConfigError, MetricsError};
pub use self::metrics::{
    DEFAULT_METRICS_ADDR, MetricsController, init_global as init_metrics,
    init_test as init_metrics_test,
};
pub use signal::shutdown_signal;
pub use self::tracing::init_tracing;
