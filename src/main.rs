//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `dnsbrute` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Ctrl-C handling
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use dnsbrute::config::{
    DEFAULT_MAX_AGE_DAYS, DEFAULT_MAX_DIR_SIZE_MB, DEFAULT_MAX_REPORTS, DEFAULT_REPORT_PATH,
    DEFAULT_RETRIES, DEFAULT_THREADS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use dnsbrute::initialization::init_logger_with;
use dnsbrute::plugins::EventPayload;
use dnsbrute::{
    read_wordlist, Config, LogFormat, LogLevel, ProbeMethod, Profile, ReportFormat,
    ReportSettings, ScanMode, ScanStatus, Scanner,
};

const EXIT_FATAL: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Subdomain enumeration
/// dnsbrute example.com wordlist.txt
///
/// # Directory enumeration over plain HTTP with a full report
/// dnsbrute http://example.com/app words.txt --mode directory --profile complete
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "dnsbrute",
    about = "Probes subdomains or directories of a target using a wordlist."
)]
struct Opt {
    /// Base target (domain or URL)
    target: String,

    /// Wordlist file, one entry per line
    #[arg(value_parser)]
    wordlist: PathBuf,

    /// Enumeration mode: subdomain|directory
    #[arg(long, value_enum, default_value_t = ScanMode::Subdomain)]
    mode: ScanMode,

    /// Number of probing workers
    #[arg(short = 't', long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Pause before each request, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_seconds: u64,

    /// Retries after the first attempt for timeouts and connection failures
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// HTTP method: head|get
    #[arg(long, value_enum, default_value_t = ProbeMethod::Head)]
    method: ProbeMethod,

    /// Proxy URL for every probe
    #[arg(long)]
    proxy: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Status codes that count as found (comma separated)
    #[arg(long, value_delimiter = ',')]
    status_codes: Vec<u16>,

    /// Requests per second rate limit (0 disables limiting)
    #[arg(long, default_value_t = 0)]
    rate_limit_rps: u32,

    /// Persist the probe cache to this file between runs
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Report profile: minimal|standard|complete
    #[arg(long, value_enum, default_value_t = Profile::Standard)]
    profile: Profile,

    /// Report directory
    #[arg(long, default_value = DEFAULT_REPORT_PATH)]
    report_path: PathBuf,

    /// Formats rendered by the complete profile (comma separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    formats: Vec<ReportFormat>,

    /// Maximum number of report files kept
    #[arg(long, default_value_t = DEFAULT_MAX_REPORTS)]
    max_reports: usize,

    /// Maximum total size of the report directory in megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_DIR_SIZE_MB)]
    max_dir_size_mb: u64,

    /// Delete reports older than this many days
    #[arg(long, default_value_t = DEFAULT_MAX_AGE_DAYS)]
    max_age_days: u64,

    /// Never gzip large reports
    #[arg(long)]
    no_compression: bool,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,
}

impl Opt {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        let mut report = ReportSettings {
            max_reports: self.max_reports,
            max_dir_size_mb: self.max_dir_size_mb,
            max_age_days: self.max_age_days,
            compression: !self.no_compression,
            ..ReportSettings::default()
        };
        if !self.formats.is_empty() {
            report.enabled_formats = self.formats;
        }
        Config {
            threads: self.threads,
            delay: Duration::from_millis(self.delay_ms),
            timeout: Duration::from_secs(self.timeout_seconds),
            retries: self.retries,
            mode: self.mode,
            method: self.method,
            proxy: self.proxy,
            verify_ssl: !self.insecure,
            user_agent: self.user_agent,
            profile: self.profile,
            report_path: self.report_path,
            allowed_status_codes: if self.status_codes.is_empty() {
                defaults.allowed_status_codes.clone()
            } else {
                self.status_codes.into_iter().collect()
            },
            rate_limit_rps: self.rate_limit_rps,
            cache_file: self.cache_file,
            report,
            log_level: self.log_level,
            log_format: self.log_format,
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let target = opt.target.clone();
    let wordlist_path = opt.wordlist.clone();
    let config = opt.into_config();

    // Initialize logger based on config
    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    let wordlist = match read_wordlist(&wordlist_path).await {
        Ok(lines) => lines,
        Err(e) => {
            eprintln!("dnsbrute error: {:#}", e);
            process::exit(EXIT_FATAL);
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing in-flight probes");
            ctrl_c.cancel();
        }
    });

    let scanner = Scanner::new(config).with_cancellation(cancel);
    let printer = scanner.events().observe(|event| {
        if let EventPayload::ResultFound { result } = &event.payload {
            if result.found {
                if let Some(status) = result.status() {
                    println!("{} [{}]", result.target, status);
                }
            }
        }
    });

    match scanner.run(&target, wordlist).await {
        Ok(report) => {
            // The bus is closed at scan end; wait for the printer to drain
            let _ = printer.await;
            println!(
                "Probed {} target{} ({} found, {} errors) in {:.1}s",
                report.metrics.total_requests,
                if report.metrics.total_requests == 1 { "" } else { "s" },
                report.metrics.found_count,
                report.metrics.errors,
                report.elapsed_seconds
            );
            for artifact in &report.artifacts {
                println!("Report saved in {}", artifact.path.display());
            }
            for fallback in &report.fallback_reports {
                eprintln!("Fallback report saved in {}", fallback.display());
            }
            for warning in &report.report_warnings {
                eprintln!("warning: {}", warning);
            }
            if report.status == ScanStatus::Interrupted {
                process::exit(EXIT_INTERRUPTED);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("dnsbrute error: {:#}", e);
            process::exit(EXIT_FATAL);
        }
    }
}
