//! Signal handling for graceful shutdown.

use tracing::{info, warn};

/// Wait for SIGINT, SIGTERM or SIGQUIT.
///
/// If handlers cannot be installed the future never resolves, leaving the
/// run to finish on its own.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let handlers = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    );
    let (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) = handlers else {
        warn!("Failed to install signal handlers, shutdown signals will be ignored");
        return std::future::pending().await;
    };

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    info!(signal = name, "Signal received, finishing in-flight files");
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to install Ctrl-C handler, shutdown signals will be ignored");
        return std::future::pending().await;
    }
    info!(signal = "ctrl-c", "Signal received, finishing in-flight files");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_future_is_pending_without_signal() {
        let result =
            tokio::time::timeout(Duration::from_millis(20), super::shutdown_signal()).await;
        assert!(result.is_err(), "no signal was sent");
    }
}
