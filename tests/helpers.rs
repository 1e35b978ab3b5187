// Shared helpers for integration tests.
//
// Directory mode is used against wiremock: subdomains of 127.0.0.1 do not resolve.

use std::path::Path;
use std::time::Duration;

use dnsbrute::{Config, LogFormat, LogLevel, ScanMode};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A directory-mode configuration writing reports into `report_dir`.
#[allow(dead_code)] // Used by other test files
pub fn test_config(report_dir: &Path) -> Config {
    Config {
        threads: 4,
        timeout: Duration::from_secs(2),
        retries: 0,
        retry_backoff_ms: 10,
        mode: ScanMode::Directory,
        user_agent: "dnsbrute_test/1.0".to_string(),
        report_path: report_dir.to_path_buf(),
        sample_interval: Duration::from_millis(50),
        log_level: LogLevel::Error,
        log_format: LogFormat::Plain,
        ..Default::default()
    }
}

/// Answers HEAD `/{route}` with `status`.
#[allow(dead_code)]
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("HEAD"))
        .and(path(format!("/{route}")))
        .respond_with(ResponseTemplate::new(status).insert_header("content-type", "text/html"))
        .mount(server)
        .await;
}

/// Number of report artifacts in `dir`.
#[allow(dead_code)]
pub fn count_artifacts(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .expect("read report dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("report_"))
        .count()
}
