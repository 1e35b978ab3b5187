//! End-of-scan statistics.

use std::collections::BTreeMap;

use log::{debug, info};
use strum::IntoEnumIterator;

use crate::error_handling::{ErrorKind, FaultType, ProcessingStats};
use crate::metrics::MetricsSnapshot;
use crate::models::ScanStatus;
use crate::plugins::DispatchStats;

/// Prints probe error and absorbed fault counts to the log.
pub fn print_error_statistics(error_stats: &ProcessingStats) {
    let total_errors = error_stats.total_errors();
    let total_faults = error_stats.total_faults();

    if total_errors > 0 {
        info!("Probe error counts ({} total):", total_errors);
        for kind in ErrorKind::iter() {
            let count = error_stats.get_error_count(kind);
            if count > 0 {
                info!("   {}: {}", kind.as_str(), count);
            }
        }
    }

    if total_faults > 0 {
        info!("Absorbed faults ({} total):", total_faults);
        for fault in FaultType::iter() {
            let count = error_stats.get_fault_count(fault);
            if count > 0 {
                info!("   {}: {}", fault.as_str(), count);
            }
        }
    }
}

/// Prints response time statistics if any target was probed over the network.
pub fn print_timing_statistics(snapshot: &MetricsSnapshot) {
    let times = &snapshot.response_times;
    if times.count == 0 {
        return;
    }
    info!(
        "Response times over {} probe{}: mean {:.1}ms, median {:.1}ms, min {}ms, max {}ms",
        times.count,
        if times.count == 1 { "" } else { "s" },
        times.mean_ms,
        times.median_ms,
        times.min_ms,
        times.max_ms
    );
}

/// Logs how long handing each event kind to observers took.
pub fn print_event_statistics(dispatch: &BTreeMap<String, DispatchStats>, dropped: u64) {
    for (kind, stats) in dispatch {
        debug!(
            "Event {}: {} dispatched, mean {:.1}us, min {}us, max {}us",
            kind, stats.count, stats.mean_us, stats.min_us, stats.max_us
        );
    }
    if dropped > 0 {
        info!("{} event(s) dropped for slow observers", dropped);
    }
}

/// Prints a one-line summary of the scan.
pub fn print_scan_summary(status: ScanStatus, snapshot: &MetricsSnapshot, elapsed_seconds: f64) {
    info!(
        "Scan {}: {} target{} ({} found, {} errors, {} from cache) in {:.1}s",
        status,
        snapshot.total_requests,
        if snapshot.total_requests == 1 { "" } else { "s" },
        snapshot.found_count,
        snapshot.errors,
        snapshot.cache_hits,
        elapsed_seconds
    );
}
