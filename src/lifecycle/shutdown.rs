//! Bounded graceful shutdown.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Drive `serve` to completion, but give up `grace` after `shutdown` fires.
///
/// `serve` is expected to begin its own graceful drain when `shutdown` is
/// cancelled. Returns `None` if the drain did not finish in time.
pub async fn bounded<F>(
    name: &'static str,
    serve: F,
    shutdown: CancellationToken,
    grace: Duration,
) -> Option<F::Output>
where
    F: Future,
{
    tokio::pin!(serve);
    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        biased;
        output = &mut serve => Some(output),
        _ = deadline => {
            tracing::warn!(
                server = name,
                grace = ?grace,
                "Graceful shutdown timed out, dropping open connections"
            );
            None
        }
    }
}
