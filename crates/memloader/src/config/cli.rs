//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use super::{Config, MetricsConfig, StoreConfig};
use crate::error::ConfigError;

/// Load gzipped device-install logs into per-device-type memcached stores.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct CliArgs {
    /// YAML configuration file
    #[arg(short, long, env = "MEMLOADER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Glob pattern for input files
    #[arg(long)]
    pub pattern: Option<String>,

    /// Log records instead of writing them to the stores
    #[arg(long)]
    pub dry: bool,

    /// With --dry, leave files that pass the error-rate gate unmarked
    #[arg(long, requires = "dry")]
    pub dry_keep_files: bool,

    /// Store address for idfa records
    #[arg(long, value_name = "HOST:PORT")]
    pub idfa: Option<String>,

    /// Store address for gaid records
    #[arg(long, value_name = "HOST:PORT")]
    pub gaid: Option<String>,

    /// Store address for adid records
    #[arg(long, value_name = "HOST:PORT")]
    pub adid: Option<String>,

    /// Store address for dvid records
    #[arg(long, value_name = "HOST:PORT")]
    pub dvid: Option<String>,

    /// Number of files processed concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Highest per-file error rate that still marks a file complete
    #[arg(long)]
    pub max_error_rate: Option<f64>,

    /// Serve Prometheus metrics on this address
    #[arg(long, value_name = "HOST:PORT")]
    pub metrics_address: Option<String>,

    /// Debug-level logging when RUST_LOG is unset
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Build the effective configuration: file (or defaults), then flags.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(pattern) = &self.pattern {
            config.source.pattern = pattern.clone();
        }
        if self.dry {
            config.dry_run = true;
        }
        if self.dry_keep_files {
            config.dry_run_marks_files = false;
        }
        let overrides = [
            ("idfa", &self.idfa),
            ("gaid", &self.gaid),
            ("adid", &self.adid),
            ("dvid", &self.dvid),
        ];
        for (device_type, address) in overrides {
            if let Some(address) = address {
                config
                    .stores
                    .entry(device_type.to_string())
                    .and_modify(|store| store.address = address.clone())
                    .or_insert_with(|| StoreConfig::new(address.clone()));
            }
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(rate) = self.max_error_rate {
            config.error_handling.max_error_rate = rate;
        }
        if let Some(address) = &self.metrics_address {
            config.metrics = Some(MetricsConfig {
                address: address.clone(),
            });
        }
    }
}
