//! Progress logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::scheduler::ResultPipeline;

/// Logs how many targets have produced a result and the current rate.
pub fn log_progress(start_time: Instant, completed: usize) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    #[allow(clippy::cast_precision_loss)]
    let rate = if elapsed_secs > 0.0 {
        completed as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Probed {} targets in {:.2} seconds (~{:.2} targets/sec)",
        completed, elapsed_secs, rate
    );
}

/// Logs progress every `every` until `cancel` fires.
pub fn start_progress_logger(
    start_time: Instant,
    pipeline: Arc<ResultPipeline>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => log_progress(start_time, pipeline.recorded()),
                _ = cancel.cancelled() => break,
            }
        }
    })
}
