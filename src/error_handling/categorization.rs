//! Error categorization and retry backoff.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::{ErrorKind, ProbeError};

/// Creates the backoff schedule applied between retries.
///
/// Delays are `initial_ms`, then multiplied by `RETRY_FACTOR` on every retry and capped
/// at `RETRY_MAX_DELAY_SECS`. The iterator is limited to `retries` items: one pause per
/// retry, none after the final attempt.
pub fn get_retry_strategy(initial_ms: u64, retries: u32) -> impl Iterator<Item = Duration> {
    use crate::config::{RETRY_FACTOR, RETRY_MAX_DELAY_SECS};

    let max_delay = Duration::from_secs(RETRY_MAX_DELAY_SECS);
    // ExponentialBackoff yields factor * base^n for n >= 1, so base = RETRY_FACTOR and
    // factor = initial_ms give initial_ms * RETRY_FACTOR^n; dividing once starts at n = 0
    #[allow(clippy::cast_possible_truncation)]
    let divisor = RETRY_FACTOR.max(1) as u32;
    ExponentialBackoff::from_millis(RETRY_FACTOR.max(1))
        .factor(initial_ms.max(1))
        .map(move |delay| (delay / divisor).min(max_delay))
        .take(retries as usize)
}

/// Categorizes a `reqwest::Error` into an [`ErrorKind`].
///
/// Probes never call `error_for_status`, so an HTTP status is a result rather than an
/// error; only transport-level conditions are inspected here.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> ErrorKind {
    if error.is_builder() {
        ErrorKind::Builder
    } else if error.is_timeout() {
        ErrorKind::Timeout
    } else if error.is_connect() {
        ErrorKind::Connect
    } else if error.is_redirect() {
        ErrorKind::Redirect
    } else if error.is_request() {
        ErrorKind::Request
    } else if error.is_body() {
        ErrorKind::Body
    } else if error.is_decode() {
        ErrorKind::Decode
    } else {
        ErrorKind::Other
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        let kind = categorize_reqwest_error(&error);
        // Strip the URL so cached and reported messages don't repeat the target
        ProbeError::new(kind, error.without_url().to_string())
    }
}
