//! Graceful shutdown handling.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stops the scan's background tasks and waits for them.
///
/// `background` stops the progress logger, metrics publisher and resource sampler;
/// the rate limiter's refill task has its own token.
pub async fn shutdown_gracefully(
    background: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    rate_limiter_shutdown: Option<CancellationToken>,
) {
    background.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            log::warn!("Background task ended abnormally: {}", e);
        }
    }

    if let Some(shutdown) = rate_limiter_shutdown {
        shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_stops_tasks() {
        let background = CancellationToken::new();
        let limiter = CancellationToken::new();
        let token = background.clone();
        let task = tokio::spawn(async move { token.cancelled().await });

        tokio::time::timeout(
            Duration::from_secs(1),
            shutdown_gracefully(background, vec![task], Some(limiter.clone())),
        )
        .await
        .expect("shutdown should not hang");
        assert!(limiter.is_cancelled());
    }
}
