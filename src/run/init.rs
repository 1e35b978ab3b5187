//! Scan resource initialization.
//!
//! This module contains `init_scan_resources`, which performs every setup step
//! between receiving a configuration and handing targets to the scheduler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::start_progress_logger;
use crate::cache::{load_from_file, ProbeCache};
use crate::config::{Config, LOGGING_INTERVAL};
use crate::error_handling::{FaultType, ProcessingStats, ScanError};
use crate::fetch::{HttpProber, Prober};
use crate::initialization::{init_client, init_rate_limiter};
use crate::metrics::{start_resource_sampler, MetricsCollector};
use crate::models::ProbeResult;
use crate::plugins::{EventBus, EventPayload, Plugin, PluginHost};
use crate::report::ReportStore;
use crate::scheduler::{ProbeScheduler, ResultPipeline};
use crate::target::BaseTarget;

use super::resources::ScanResources;

/// Caller-supplied collaborators for a scan.
pub struct ScanOptions {
    pub plugins: Vec<Plugin>,
    pub events: EventBus,
    pub prober: Option<Arc<dyn Prober>>,
    pub sink: Option<UnboundedSender<ProbeResult>>,
}

/// Publishes a `metrics_update` event every `every` until `cancel` fires.
fn start_metrics_publisher(
    metrics: Arc<MetricsCollector>,
    events: EventBus,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(100)));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if events.observer_count() > 0 {
                        events.emit(EventPayload::MetricsUpdate {
                            snapshot: metrics.snapshot(),
                        });
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}

/// Initialize all resources needed for a scan.
///
/// This function performs the following steps:
/// 1. Load plugins (`on_load`)
/// 2. Validate the configuration, run the `pre_scan` chain, validate again
/// 3. Parse the base target
/// 4. Build the HTTP prober unless one was supplied
/// 5. Create the cache and restore persisted entries
/// 6. Set up rate limiting, metrics and resource sampling
/// 7. Open the report store
/// 8. Start progress logging and live metrics events
///
/// Returns the parsed base target alongside the resources.
///
/// # Errors
///
/// Returns `ScanError::Validation` for an impossible configuration or base target,
/// `ScanError::PluginAborted` when a `pre_scan` hook aborts, and
/// `ScanError::Initialization` when the HTTP client cannot be built.
pub fn init_scan_resources(
    config: Config,
    base_target: &str,
    options: ScanOptions,
) -> Result<(ScanResources, BaseTarget), ScanError> {
    let ScanOptions {
        plugins,
        events,
        prober,
        sink,
    } = options;
    let error_stats = Arc::new(ProcessingStats::new());

    let plugins = Arc::new(PluginHost::load(plugins, Arc::clone(&error_stats)));
    if !plugins.is_empty() {
        info!("Loaded plugins: {}", plugins.names().join(", "));
    }

    config.validate()?;
    let config = plugins.pre_scan(config)?;
    config.validate()?;

    let base = BaseTarget::parse(base_target)?;

    let prober: Arc<dyn Prober> = match prober {
        Some(prober) => prober,
        None => {
            let client = init_client(&config)?;
            Arc::new(HttpProber::new(client, config.method))
        }
    };

    let cache = Arc::new(ProbeCache::new(config.cache_capacity));
    if let Some(path) = &config.cache_file {
        match load_from_file(path) {
            Ok(entries) => {
                let count = entries.len();
                cache.extend(entries);
                debug!("Restored {} cached results from {}", count, path.display());
            }
            Err(e) => {
                warn!("Ignoring cache file {}: {:#}", path.display(), e);
                error_stats.increment_fault(FaultType::CacheLoad);
            }
        }
    }

    let rate_burst = if config.rate_limit_rps > 0 {
        let rps_doubled = config.rate_limit_rps.saturating_mul(2);
        std::cmp::min(config.threads, rps_doubled as usize)
    } else {
        config.threads
    };
    let (request_limiter, rate_limiter_shutdown) =
        match init_rate_limiter(config.rate_limit_rps, rate_burst) {
            Some((limiter, shutdown)) => (Some(limiter), Some(shutdown)),
            None => (None, None),
        };

    let metrics = Arc::new(MetricsCollector::new());
    let pipeline = Arc::new(ResultPipeline::new(
        Arc::clone(&plugins),
        Arc::clone(&metrics),
        events.clone(),
        Arc::clone(&error_stats),
        sink,
    ));
    let scheduler = ProbeScheduler::new(
        &config,
        prober,
        Arc::clone(&cache),
        request_limiter,
        Arc::clone(&pipeline),
    );

    let mut report_warnings = Vec::new();
    let report_store = match ReportStore::open(
        &config.report_path,
        config.profile,
        &config.report,
        events.clone(),
        Arc::clone(&error_stats),
    ) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(
                "Report directory {} is unavailable, no reports will be written: {}",
                config.report_path.display(),
                e
            );
            error_stats.increment_fault(FaultType::ReportWrite);
            report_warnings.push(format!(
                "report directory {} unavailable: {}",
                config.report_path.display(),
                e
            ));
            None
        }
    };

    let start_time = Instant::now();
    let background = CancellationToken::new();
    let background_tasks = vec![
        start_resource_sampler(
            Arc::clone(&metrics),
            config.sample_interval,
            background.clone(),
        ),
        start_metrics_publisher(
            Arc::clone(&metrics),
            events.clone(),
            config.metrics_interval,
            background.clone(),
        ),
        start_progress_logger(
            start_time,
            Arc::clone(&pipeline),
            Duration::from_secs(LOGGING_INTERVAL),
            background.clone(),
        ),
    ];

    let resources = ScanResources {
        base_target: base_target.trim().to_string(),
        plugins,
        events,
        pipeline,
        scheduler,
        cache,
        metrics,
        report_store,
        report_warnings,
        error_stats,
        background,
        background_tasks,
        rate_limiter_shutdown,
        start_time,
        config,
    };
    Ok((resources, base))
}
