//! Scan orchestration.
//!
//! A scan runs in three phases: [`init::init_scan_resources`] validates and wires
//! every component, the scheduler drains the target sequence, and
//! [`finalize::finalize_scan`] runs `post_scan`, emits `scan_end` and writes reports.

mod finalize;
mod init;
mod resources;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error_handling::ScanError;
use crate::fetch::Prober;
use crate::metrics::MetricsSnapshot;
use crate::models::{ProbeResult, ScanStatus};
use crate::plugins::{DispatchStats, EventBus, EventPayload, Plugin};
use crate::report::ReportArtifact;
use crate::target::TargetGenerator;

use finalize::finalize_scan;
use init::{init_scan_resources, ScanOptions};

/// Results of a scan that started.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// `Completed` if every submitted target produced a result
    pub status: ScanStatus,
    /// Final results, in the order they were recorded, after `post_scan`
    pub results: Vec<ProbeResult>,
    pub metrics: MetricsSnapshot,
    /// Report files written and kept by retention
    pub artifacts: Vec<ReportArtifact>,
    /// Report faults that did not stop the scan
    pub report_warnings: Vec<String>,
    /// Plain-text summaries saved for report files that could not be written
    pub fallback_reports: Vec<PathBuf>,
    /// Time spent dispatching each event kind to observers
    pub event_dispatch: BTreeMap<String, DispatchStats>,
    /// Targets handed to the workers
    pub submitted: usize,
    /// Targets dropped after cancellation and the grace period
    pub abandoned: usize,
    pub elapsed_seconds: f64,
}

/// Builder for a scan with plugins, observers or a custom prober.
///
/// [`run_scan`] covers the common case.
///
/// # Example
///
/// ```no_run
/// use dnsbrute::{Config, Scanner};
/// use dnsbrute::plugins::Plugin;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let scanner = Scanner::new(Config::default())
///     .with_plugin(Plugin::new("tag").with_on_result(|r| Ok(r.clone())));
/// let mut events = scanner.events().subscribe();
/// let report = scanner.run("example.com", ["www", "api"]).await?;
/// while let Ok(event) = events.try_recv() {
///     println!("{}", event.kind());
/// }
/// println!("{} results", report.results.len());
/// # Ok(())
/// # }
/// ```
pub struct Scanner {
    config: Config,
    plugins: Vec<Plugin>,
    events: EventBus,
    prober: Option<Arc<dyn Prober>>,
    sink: Option<UnboundedSender<ProbeResult>>,
    cancel: CancellationToken,
}

impl Scanner {
    pub fn new(config: Config) -> Self {
        Scanner {
            config,
            plugins: Vec::new(),
            events: EventBus::new(),
            prober: None,
            sink: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Registers a plugin; hooks run in registration order.
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Uses an existing event bus instead of a fresh one.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Replaces the HTTP prober.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Streams every recorded result to `sink` as soon as it is recorded.
    pub fn with_result_sink(mut self, sink: UnboundedSender<ProbeResult>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Cancelling `cancel` stops the scan; in-flight probes get the grace period.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The bus events are emitted on. Subscribe before calling [`Scanner::run`].
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Probes every target built from `base_target` and `wordlist`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the scan cannot start: an invalid configuration or
    /// base target, a `pre_scan` abort, or an HTTP client that cannot be built. Once
    /// probing starts, every fault is absorbed and the scan returns a [`ScanReport`].
    pub async fn run<W, S>(self, base_target: &str, wordlist: W) -> Result<ScanReport, ScanError>
    where
        W: IntoIterator<Item = S>,
        W::IntoIter: Send + 'static,
        S: AsRef<str>,
    {
        let Scanner {
            config,
            plugins,
            events,
            prober,
            sink,
            cancel,
        } = self;

        let options = ScanOptions {
            plugins,
            events,
            prober,
            sink,
        };
        let (resources, base) = init_scan_resources(config, base_target, options)?;

        let mode = resources.config.mode;
        info!(
            "Scanning {} ({:?} mode) with {} workers, profile {}",
            resources.base_target, mode, resources.config.threads, resources.config.profile
        );
        resources.events.emit(EventPayload::ScanStart {
            base_target: resources.base_target.clone(),
            mode,
            profile: resources.config.profile,
        });

        let targets = TargetGenerator::new(base, mode, wordlist);
        let outcome = resources.scheduler.run(targets, cancel).await;

        Ok(finalize_scan(resources, outcome).await)
    }
}

/// Runs a scan with the provided configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// See [`Scanner::run`].
///
/// # Example
///
/// ```no_run
/// use dnsbrute::{run_scan, Config};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = run_scan(Config::default(), "example.com", ["www", "mail"]).await?;
/// println!("{}: {} found", report.status, report.metrics.found_count);
/// # Ok(())
/// # }
/// ```
pub async fn run_scan<W, S>(
    config: Config,
    base_target: &str,
    wordlist: W,
) -> Result<ScanReport, ScanError>
where
    W: IntoIterator<Item = S>,
    W::IntoIter: Send + 'static,
    S: AsRef<str>,
{
    Scanner::new(config).run(base_target, wordlist).await
}

/// Reads a wordlist file into lines.
///
/// Lines are returned as they appear; blank lines and `#` comments are skipped later
/// by the target generator.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn read_wordlist(path: &Path) -> Result<Vec<String>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open wordlist {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut entries = Vec::new();
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("Failed to read wordlist {}", path.display()))?
    {
        entries.push(line);
    }
    info!("Read {} wordlist lines from {}", entries.len(), path.display());
    Ok(entries)
}
