//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM and SIGINT handlers
//! - Turn the first one received into a cancellation of the root token
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second signal is left to the default disposition once handlers drop

use tokio_util::sync::CancellationToken;

/// Resolve once SIGTERM or SIGINT arrives.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => tracing::info!("Received SIGTERM"),
        _ = interrupt.recv() => tracing::info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C");
    Ok(())
}

/// Cancel `token` on the first termination signal.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => token.cancel(),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });
}
