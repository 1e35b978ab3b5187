//! Scan finalization.
//!
//! This module contains `finalize_scan`, which runs once every worker has exited and
//! turns the recorded results into the final report.

use chrono::Utc;
use log::warn;

use crate::app::{
    log_progress, print_error_statistics, print_event_statistics, print_scan_summary,
    print_timing_statistics, shutdown_gracefully,
};
use crate::cache::save_to_file;
use crate::error_handling::FaultType;
use crate::plugins::EventPayload;
use crate::report::ReportDocument;
use crate::scheduler::SchedulerOutcome;

use super::resources::ScanResources;
use super::ScanReport;

/// Finalize a scan and produce the report.
///
/// Steps, in order:
/// 1. Stop background tasks and the rate limiter
/// 2. Run the `post_scan` chain over the ordered results
/// 3. Emit `scan_end` (exactly once)
/// 4. Render and write report artifacts
/// 5. Persist the cache if a cache file is configured
/// 6. Close the event bus and print statistics, event dispatch timings included
pub async fn finalize_scan(resources: ScanResources, outcome: SchedulerOutcome) -> ScanReport {
    let ScanResources {
        config,
        base_target,
        plugins,
        events,
        pipeline,
        cache,
        metrics,
        report_store,
        mut report_warnings,
        error_stats,
        background,
        background_tasks,
        rate_limiter_shutdown,
        start_time,
        ..
    } = resources;

    shutdown_gracefully(background, background_tasks, rate_limiter_shutdown).await;
    log_progress(start_time, pipeline.recorded());

    let results = plugins.post_scan(pipeline.take_results());
    let snapshot = metrics.finish();
    let status = outcome.status();

    events.emit(EventPayload::ScanEnd {
        status,
        total_results: results.len(),
    });

    let mut artifacts = Vec::new();
    let mut fallback_reports = Vec::new();
    if let Some(store) = report_store {
        let document = ReportDocument {
            target: base_target,
            profile: config.profile,
            status,
            results: results.clone(),
            metrics: snapshot.clone(),
            generated_at: Utc::now(),
        };
        if let Err(e) = store.submit(&document).await {
            warn!("Failed to queue report: {}", e);
            error_stats.increment_fault(FaultType::ReportWrite);
            report_warnings.push(e.to_string());
        }
        let summary = store.finish().await;
        artifacts = summary.artifacts;
        fallback_reports = summary.fallbacks;
        report_warnings.extend(summary.warnings);
    }

    if let Some(path) = &config.cache_file {
        match save_to_file(path, &cache) {
            Ok(count) => log::debug!("Saved {} cached results to {}", count, path.display()),
            Err(e) => {
                warn!("Failed to save cache file {}: {:#}", path.display(), e);
                error_stats.increment_fault(FaultType::CacheSave);
            }
        }
    }

    // Observers drain what was already sent, then their channels close
    events.close();
    let event_dispatch = events.dispatch_stats();

    let elapsed_seconds = start_time.elapsed().as_secs_f64();
    print_error_statistics(&error_stats);
    print_timing_statistics(&snapshot);
    print_event_statistics(&event_dispatch, events.dropped_events());
    print_scan_summary(status, &snapshot, elapsed_seconds);
    if outcome.abandoned > 0 {
        warn!(
            "{} target{} abandoned after the grace period",
            outcome.abandoned,
            if outcome.abandoned == 1 { "" } else { "s" }
        );
    }

    ScanReport {
        status,
        results,
        metrics: snapshot,
        artifacts,
        report_warnings,
        fallback_reports,
        event_dispatch,
        submitted: outcome.submitted,
        abandoned: outcome.abandoned,
        elapsed_seconds,
    }
}
