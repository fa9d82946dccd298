//! memloader CLI: load device-install logs into memcached.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use memloader::{CliArgs, init_tracing, run_loader};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let config = match args.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        pattern = %config.source.pattern,
        stores = config.stores.len(),
        dry_run = config.dry_run,
        "Starting memloader"
    );
    for (device_type, store) in &config.stores {
        info!("  Store: {} -> {}", device_type, store.address);
    }

    match run_loader(&config).await {
        Ok(summary) => {
            info!(
                committed = summary.files_committed,
                retained = summary.files_retained,
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Loader failed: {e}");
            ExitCode::FAILURE
        }
    }
}
