//! Scan resources and state management.
//!
//! This module defines the `ScanResources` struct which holds everything a scan
//! owns between initialization and finalization.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::ProbeCache;
use crate::config::Config;
use crate::error_handling::ProcessingStats;
use crate::metrics::MetricsCollector;
use crate::plugins::{EventBus, PluginHost};
use crate::report::ReportStore;
use crate::scheduler::{ProbeScheduler, ResultPipeline};

/// All resources initialized for a scan.
pub struct ScanResources {
    // Configuration
    /// Configuration after the `pre_scan` chain
    pub config: Config,
    /// Base target as given by the caller (used in events and reports)
    pub base_target: String,

    // Pipeline
    pub plugins: Arc<PluginHost>,
    pub events: EventBus,
    pub pipeline: Arc<ResultPipeline>,
    pub scheduler: ProbeScheduler,
    pub cache: Arc<ProbeCache>,
    pub metrics: Arc<MetricsCollector>,

    // Reports
    /// `None` when the report directory could not be opened
    pub report_store: Option<ReportStore>,
    /// Report faults raised before the scan started
    pub report_warnings: Vec<String>,

    // Statistics tracking
    pub error_stats: Arc<ProcessingStats>,

    // Background tasks
    /// Stops the progress logger, metrics publisher and resource sampler
    pub background: CancellationToken,
    pub background_tasks: Vec<JoinHandle<()>>,
    /// Shutdown handle for the rate limiter refill task
    pub rate_limiter_shutdown: Option<CancellationToken>,

    /// Start time for elapsed time calculations
    pub start_time: Instant,
}
