//! Configuration constants.
//!
//! This module defines the defaults and operational limits used throughout the scanner,
//! including worker counts, timeouts, retry backoff and report retention limits.

use std::time::Duration;

/// Default number of probing workers
pub const DEFAULT_THREADS: usize = 10;
/// Default per-attempt probe timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 2;
/// Progress logging interval in seconds
pub const LOGGING_INTERVAL: u64 = 5;

/// Default User-Agent string for probe requests.
///
/// Users can override this via the `--user-agent` CLI flag.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Status codes that mark a probe as "found" unless configured otherwise
pub const DEFAULT_ALLOWED_STATUS_CODES: &[u16] = &[200, 204, 301, 302, 307, 401, 403];

/// Scheme used to build probe URLs when the base target has none
pub const DEFAULT_SCHEME: &str = "https";

// Cache
/// Maximum number of probe results kept in the LRU cache
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

// Retry strategy
/// Initial delay in milliseconds before the first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 250;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 5;

// Scheduling
/// How long in-flight probes may keep running after a scan is cancelled
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
/// Capacity of the target queue per worker (generator backpressure)
pub const QUEUE_SLOTS_PER_WORKER: usize = 4;

// Metrics
/// Interval between process resource samples
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
/// Interval between live metrics snapshots published on the event bus
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);
/// Resource samples kept per scan; older samples are dropped first
pub const MAX_RESOURCE_SAMPLES: usize = 3600;

// Events
/// Undelivered events buffered per observer before further events are dropped for it
pub const DEFAULT_EVENT_BUFFER: usize = 10_000;

// Reports
/// Maximum number of report artifacts kept in the report directory
pub const DEFAULT_MAX_REPORTS: usize = 100;
/// Maximum total size of the report directory in megabytes
pub const DEFAULT_MAX_DIR_SIZE_MB: u64 = 500;
/// Maximum age of a report artifact in days
pub const DEFAULT_MAX_AGE_DAYS: u64 = 30;
/// Artifacts larger than this (in megabytes) are gzip-compressed after writing
pub const DEFAULT_COMPRESSION_THRESHOLD_MB: u64 = 1;
/// Capacity of the report write queue before producers block
pub const DEFAULT_MAX_WRITE_QUEUE: usize = 1000;
/// Number of queued writes flushed together
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 10;
/// Maximum time a queued write waits before being flushed
pub const DEFAULT_WRITE_INTERVAL_SECS: u64 = 5;
/// Default report directory
pub const DEFAULT_REPORT_PATH: &str = "./reports";
/// File name prefix shared by every report artifact
pub const REPORT_FILE_PREFIX: &str = "report_";

/// Bytes per megabyte, used by the size-based report limits
pub const BYTES_PER_MB: u64 = 1024 * 1024;
