use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel a fresh token when SIGTERM or SIGINT arrives.
///
/// Handlers are installed before returning, so a failure to install them is
/// reported to the caller instead of being lost in a background task.
pub fn install_shutdown_handler() -> miette::Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| miette::miette!("Failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| miette::miette!("Failed to install SIGINT handler: {}", e))?;

    let token = CancellationToken::new();
    let signalled = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        signalled.cancel();
    });

    Ok(token)
}
