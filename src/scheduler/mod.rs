//! Probe scheduling.
//!
//! A producer task feeds targets into a bounded FIFO queue; `threads` worker tasks
//! drain it. For each target a worker:
//! 1. serves a cached result if there is one
//! 2. otherwise takes the per-identity lock and checks the cache again, so a worker
//!    that waited behind another one reuses its result
//! 3. otherwise waits out `delay` and the rate limiter, then probes with retries
//! 4. caches a freshly probed result, releases the lock and hands the result to the
//!    [`ResultPipeline`]
//!
//! Cancellation stops dispatch at once. A target already being processed gets
//! `grace_period` to finish; if it does not, it is dropped without a result.

mod inflight;
mod pipeline;

pub use inflight::{InFlight, InFlightGuard};
pub use pipeline::ResultPipeline;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::ProbeCache;
use crate::config::{Config, QUEUE_SLOTS_PER_WORKER};
use crate::fetch::{probe_with_retry, Prober, RetryPolicy};
use crate::initialization::RateLimiter;
use crate::models::{ProbeResult, ScanStatus};
use crate::target::Target;

/// How a scheduler run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerOutcome {
    /// Targets that entered the queue
    pub submitted: usize,
    /// Targets that produced a result
    pub completed: usize,
    /// Targets dropped after the grace period
    pub abandoned: usize,
    /// The producer reached the end of the target sequence
    pub exhausted: bool,
}

impl SchedulerOutcome {
    pub fn status(&self) -> ScanStatus {
        if self.exhausted && self.completed == self.submitted {
            ScanStatus::Completed
        } else {
            ScanStatus::Interrupted
        }
    }
}

#[derive(Debug, Default)]
struct WorkerStats {
    completed: usize,
    abandoned: usize,
}

struct WorkerContext {
    prober: Arc<dyn Prober>,
    cache: Arc<ProbeCache>,
    inflight: InFlight,
    limiter: Option<Arc<RateLimiter>>,
    policy: RetryPolicy,
    delay: Duration,
    config: Arc<Config>,
    pipeline: Arc<ResultPipeline>,
}

impl WorkerContext {
    fn mark_found(&self, mut result: ProbeResult) -> ProbeResult {
        result.found = result
            .status()
            .is_some_and(|code| self.config.is_allowed_status(code));
        result
    }

    fn cached(&self, target: &Target) -> Option<ProbeResult> {
        self.cache
            .get(&target.identity)
            .map(|hit| self.mark_found(hit.as_cache_hit()))
    }

    async fn process_target(&self, target: Target) -> ProbeResult {
        if let Some(hit) = self.cached(&target) {
            return hit;
        }

        let _guard = self.inflight.acquire(&target.identity).await;
        if let Some(hit) = self.cached(&target) {
            log::trace!("{} was probed while waiting for its lock", target);
            return hit;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let attempts = probe_with_retry(self.prober.as_ref(), &target, &self.policy).await;
        let elapsed_ms = u64::try_from(attempts.elapsed.as_millis()).unwrap_or(u64::MAX);
        let result = match attempts.outcome {
            Ok(response) => ProbeResult::from_status(
                &target,
                response.status,
                response.content_type,
                response.content_length,
                elapsed_ms,
                attempts.attempts,
            ),
            Err(error) => ProbeResult::from_error(&target, error, elapsed_ms, attempts.attempts),
        };
        let result = self.mark_found(result);
        self.cache.insert(result.clone());
        result
    }
}

pub struct ProbeScheduler {
    ctx: Arc<WorkerContext>,
    threads: usize,
    grace_period: Duration,
}

impl ProbeScheduler {
    pub fn new(
        config: &Config,
        prober: Arc<dyn Prober>,
        cache: Arc<ProbeCache>,
        limiter: Option<Arc<RateLimiter>>,
        pipeline: Arc<ResultPipeline>,
    ) -> Self {
        let ctx = WorkerContext {
            prober,
            cache,
            inflight: InFlight::new(),
            limiter,
            policy: RetryPolicy {
                retries: config.retries,
                timeout: config.timeout,
                backoff_ms: config.retry_backoff_ms,
            },
            delay: config.delay,
            config: Arc::new(config.clone()),
            pipeline,
        };
        ProbeScheduler {
            ctx: Arc::new(ctx),
            threads: config.threads.max(1),
            grace_period: config.grace_period,
        }
    }

    /// Probes every target and returns once all workers have exited.
    pub async fn run<I>(&self, targets: I, cancel: CancellationToken) -> SchedulerOutcome
    where
        I: IntoIterator<Item = Target>,
        I::IntoIter: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.threads * QUEUE_SLOTS_PER_WORKER);
        let rx = Arc::new(Mutex::new(rx));
        let producer = spawn_producer(targets.into_iter(), tx, cancel.clone());

        let workers: Vec<JoinHandle<WorkerStats>> = (0..self.threads)
            .map(|id| {
                let ctx = Arc::clone(&self.ctx);
                let rx = Arc::clone(&rx);
                let cancel = cancel.clone();
                let grace = self.grace_period;
                tokio::spawn(async move { worker_loop(id, ctx, rx, cancel, grace).await })
            })
            .collect();
        // Workers own the only receivers now; if they all exit the producer stops too
        drop(rx);

        let mut outcome = SchedulerOutcome::default();
        for (id, finished) in join_all(workers).await.into_iter().enumerate() {
            match finished {
                Ok(stats) => {
                    outcome.completed += stats.completed;
                    outcome.abandoned += stats.abandoned;
                }
                Err(e) => log::error!("Worker {} terminated abnormally: {}", id, e),
            }
        }

        match producer.await {
            Ok((submitted, exhausted)) => {
                outcome.submitted = submitted;
                outcome.exhausted = exhausted;
            }
            Err(e) => log::error!("Target producer terminated abnormally: {}", e),
        }

        log::debug!(
            "Scheduler finished: {} submitted, {} completed, {} abandoned",
            outcome.submitted,
            outcome.completed,
            outcome.abandoned
        );
        outcome
    }
}

fn spawn_producer<I>(
    targets: I,
    tx: mpsc::Sender<Target>,
    cancel: CancellationToken,
) -> JoinHandle<(usize, bool)>
where
    I: Iterator<Item = Target> + Send + 'static,
{
    tokio::spawn(async move {
        let mut submitted = 0usize;
        for target in targets {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return (submitted, false),
                sent = tx.send(target) => {
                    if sent.is_err() {
                        return (submitted, false);
                    }
                    submitted += 1;
                }
            }
        }
        (submitted, true)
    })
}

async fn worker_loop(
    id: usize,
    ctx: Arc<WorkerContext>,
    rx: Arc<Mutex<mpsc::Receiver<Target>>>,
    cancel: CancellationToken,
    grace: Duration,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            target = async { rx.lock().await.recv().await } => target,
        };
        let Some(target) = next else {
            break;
        };

        let label = target.raw.clone();
        let work = ctx.process_target(target);
        tokio::pin!(work);
        let result = tokio::select! {
            result = &mut work => Some(result),
            _ = cancel.cancelled() => tokio::time::timeout(grace, &mut work).await.ok(),
        };

        match result {
            Some(result) => {
                ctx.pipeline.handle(result);
                stats.completed += 1;
            }
            None => {
                log::debug!("Worker {} abandoned {} after the grace period", id, label);
                stats.abandoned += 1;
            }
        }
    }
    log::trace!("Worker {} exiting", id);
    stats
}
