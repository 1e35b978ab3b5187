//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ScanMode;
use crate::error_handling::{ErrorKind, ProbeError};
use crate::fetch::{ProbeResponse, Prober};
use crate::models::ProbeResult;
use crate::target::Target;

pub(crate) fn subdomain_target(label: &str) -> Target {
    let host = format!("{label}.example.com");
    Target::new(host.clone(), format!("https://{host}"), ScanMode::Subdomain)
}

pub(crate) fn status_result(label: &str, status: u16, elapsed_ms: u64) -> ProbeResult {
    ProbeResult::from_status(
        &subdomain_target(label),
        status,
        Some("text/html".to_string()),
        None,
        elapsed_ms,
        1,
    )
}

pub(crate) fn error_result(label: &str, kind: ErrorKind) -> ProbeResult {
    ProbeResult::from_error(
        &subdomain_target(label),
        ProbeError::new(kind, "mock failure"),
        5,
        1,
    )
}

#[derive(Debug, Clone)]
pub(crate) enum MockBehavior {
    Status(u16),
    Error(ErrorKind),
    /// Never answers; only the attempt timeout ends the probe
    Hang,
    FailThenStatus {
        failures: usize,
        kind: ErrorKind,
        status: u16,
    },
    /// Status per target identity, 404 for anything else
    ByIdentity(HashMap<String, u16>),
}

/// Scriptable prober that records how it was called.
pub(crate) struct MockProber {
    behavior: MockBehavior,
    latency: Duration,
    calls: AtomicUsize,
    active: Mutex<HashMap<String, usize>>,
    max_same_key: AtomicUsize,
}

impl MockProber {
    pub(crate) fn new(behavior: MockBehavior) -> Self {
        MockProber {
            behavior,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: Mutex::new(HashMap::new()),
            max_same_key: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous probes observed for a single identity.
    pub(crate) fn max_concurrent_same_key(&self) -> usize {
        self.max_same_key.load(Ordering::SeqCst)
    }

    fn enter(&self, key: &str) {
        let mut active = self.active.lock().unwrap();
        let count = active.entry(key.to_string()).or_insert(0);
        *count += 1;
        self.max_same_key.fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, key: &str) {
        let mut active = self.active.lock().unwrap();
        if let Some(count) = active.get_mut(key) {
            *count -= 1;
        }
    }

    fn respond(&self, target: &Target, call: usize) -> Result<ProbeResponse, ProbeError> {
        let status = match &self.behavior {
            MockBehavior::Status(code) => *code,
            MockBehavior::Error(kind) => return Err(ProbeError::new(*kind, "mock failure")),
            MockBehavior::Hang => unreachable!("hanging probes never respond"),
            MockBehavior::FailThenStatus {
                failures,
                kind,
                status,
            } => {
                if call < *failures {
                    return Err(ProbeError::new(*kind, "mock failure"));
                }
                *status
            }
            MockBehavior::ByIdentity(map) => map.get(&target.identity).copied().unwrap_or(404),
        };
        Ok(ProbeResponse {
            status,
            content_type: Some("text/html".to_string()),
            content_length: Some(0),
        })
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(&self, target: &Target) -> Result<ProbeResponse, ProbeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if matches!(self.behavior, MockBehavior::Hang) {
            std::future::pending::<()>().await;
        }

        self.enter(&target.identity);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.leave(&target.identity);

        self.respond(target, call)
    }
}
