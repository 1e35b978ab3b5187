//! Configuration types.
//!
//! This module defines the enums and structs that make up a scan configuration.
//! The library never parses arguments itself: callers build a [`Config`] (usually
//! starting from `Config::default()`) and hand it to `run_scan`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::constants::*;
use crate::config::profile::Profile;
use crate::error_handling::ValidationError;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// How wordlist entries are combined with the base target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// `entry.base-domain`
    Subdomain,
    /// `base-url/entry`
    Directory,
}

/// HTTP method used for each probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// HEAD request (no body transferred)
    Head,
    /// GET request, for servers that reject HEAD
    Get,
}

/// Output format of a report artifact.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Html,
    Csv,
}

impl ReportFormat {
    /// File extension (without the leading dot).
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Report writing and retention limits.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSettings {
    /// Maximum number of artifacts kept in the report directory
    pub max_reports: usize,
    /// Maximum total size of the report directory in megabytes
    pub max_dir_size_mb: u64,
    /// Artifacts older than this many days are deleted
    pub max_age_days: u64,
    /// Artifacts larger than this many megabytes are gzip-compressed
    pub compression_threshold_mb: u64,
    /// Whether compression is applied at all
    pub compression: bool,
    /// Capacity of the write queue; producers block once it is full
    pub max_write_queue: usize,
    /// Number of queued writes flushed together
    pub write_batch_size: usize,
    /// Maximum seconds a queued write waits before a flush
    pub write_interval_seconds: u64,
    /// Formats the `complete` profile renders
    pub enabled_formats: Vec<ReportFormat>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            max_reports: DEFAULT_MAX_REPORTS,
            max_dir_size_mb: DEFAULT_MAX_DIR_SIZE_MB,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            compression_threshold_mb: DEFAULT_COMPRESSION_THRESHOLD_MB,
            compression: true,
            max_write_queue: DEFAULT_MAX_WRITE_QUEUE,
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            write_interval_seconds: DEFAULT_WRITE_INTERVAL_SECS,
            enabled_formats: vec![ReportFormat::Json, ReportFormat::Html, ReportFormat::Csv],
        }
    }
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by the library. It can be
/// constructed programmatically without any CLI dependencies.
///
/// # Examples
///
/// ```no_run
/// use dnsbrute::{Config, ScanMode};
///
/// let config = Config {
///     threads: 20,
///     mode: ScanMode::Directory,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Number of probing workers
    pub threads: usize,
    /// Pause applied by a worker before each network request
    pub delay: Duration,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub retries: u32,
    /// Subdomain or directory enumeration
    pub mode: ScanMode,
    /// HTTP method used for probes
    pub method: ProbeMethod,
    /// Optional proxy URL for all probes
    pub proxy: Option<String>,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// HTTP User-Agent header value
    pub user_agent: String,
    /// Report profile
    pub profile: Profile,
    /// Directory holding report artifacts
    pub report_path: PathBuf,
    /// Status codes that count as "found"
    pub allowed_status_codes: BTreeSet<u16>,
    /// Global request rate limit (0 disables rate limiting)
    pub rate_limit_rps: u32,
    /// Maximum entries in the probe cache
    pub cache_capacity: usize,
    /// Persist the probe cache to this file across scans (opt-in)
    pub cache_file: Option<PathBuf>,
    /// How long in-flight probes may finish after cancellation
    pub grace_period: Duration,
    /// Initial backoff before the first retry, in milliseconds
    pub retry_backoff_ms: u64,
    /// Interval between process resource samples
    pub sample_interval: Duration,
    /// Interval between live metrics events
    pub metrics_interval: Duration,
    /// Report writing and retention limits
    pub report: ReportSettings,
    /// Log level
    #[serde(skip)]
    pub log_level: LogLevel,
    /// Log format
    #[serde(skip)]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            mode: ScanMode::Subdomain,
            method: ProbeMethod::Head,
            proxy: None,
            verify_ssl: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            profile: Profile::Standard,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            allowed_status_codes: DEFAULT_ALLOWED_STATUS_CODES.iter().copied().collect(),
            rate_limit_rps: 0,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_file: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            retry_backoff_ms: RETRY_INITIAL_DELAY_MS,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            report: ReportSettings::default(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

impl Config {
    /// Rejects configurations the engine cannot run with.
    ///
    /// Scheme and length checks on the base target belong to the caller; this only
    /// catches values that would make the scheduler, cache or report store misbehave.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.threads == 0 {
            return Err(ValidationError::ZeroValue("threads"));
        }
        if self.cache_capacity == 0 {
            return Err(ValidationError::ZeroValue("cache_capacity"));
        }
        if self.timeout.is_zero() {
            return Err(ValidationError::ZeroValue("timeout"));
        }
        let report = &self.report;
        for (name, value) in [
            ("max_reports", report.max_reports as u64),
            ("max_dir_size_mb", report.max_dir_size_mb),
            ("max_age_days", report.max_age_days),
            ("max_write_queue", report.max_write_queue as u64),
            ("write_batch_size", report.write_batch_size as u64),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroValue(name));
            }
        }
        if report.enabled_formats.is_empty() {
            return Err(ValidationError::NoFormatsEnabled);
        }
        for format in self.profile.formats(&report.enabled_formats) {
            if !report.enabled_formats.contains(&format) {
                return Err(ValidationError::FormatNotEnabled {
                    profile: self.profile,
                    format,
                });
            }
        }
        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy).map_err(|e| ValidationError::InvalidProxy(e.to_string()))?;
        }
        Ok(())
    }

    /// Whether a status code counts as "found".
    pub fn is_allowed_status(&self, status: u16) -> bool {
        self.allowed_status_codes.contains(&status)
    }
}
