//! dnsbrute library: concurrent subdomain and directory probing
//!
//! This library turns a base target and a wordlist into HTTP probes executed by a
//! bounded worker pool with caching, retries and rate limiting. Results pass through
//! plugin hooks and an event bus, are folded into metrics, and end up in report
//! files whose directory is kept within configured limits.
//!
//! # Example
//!
//! ```no_run
//! use dnsbrute::{run_scan, Config, ScanMode};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     threads: 20,
//!     mode: ScanMode::Subdomain,
//!     ..Default::default()
//! };
//!
//! let report = run_scan(config, "example.com", ["www", "api", "mail"]).await?;
//! for result in report.results.iter().filter(|r| r.found) {
//!     println!("{} -> {:?}", result.target, result.status());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

mod app;
mod cache;
pub mod config;
mod error_handling;
mod fetch;
pub mod initialization;
mod metrics;
mod models;
pub mod plugins;
mod report;
mod run;
mod scheduler;
mod target;

#[cfg(test)]
mod test_helpers;

// Re-export public API
pub use config::{
    Config, LogFormat, LogLevel, ProbeMethod, Profile, ReportFormat, ReportSettings, ScanMode,
};
pub use error_handling::{
    ErrorKind, InitializationError, PluginError, ProbeError, ReportError, ScanError,
    ValidationError,
};
pub use fetch::{HttpProber, ProbeResponse, Prober};
pub use metrics::{MetricsSnapshot, ResourceAverages, ResourceSample, ResponseTimes};
pub use models::{ProbeOutcome, ProbeResult, ScanStatus};
pub use report::ReportArtifact;
pub use run::{read_wordlist, run_scan, ScanReport, Scanner};
pub use target::{Target, TargetKind};
