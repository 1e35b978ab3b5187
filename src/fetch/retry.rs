//! Retry state machine for a single target.
//!
//! `Attempt → Success | TransientFailure → (Retry | GiveUp)`, with the number of
//! retries bounded by the length of the backoff schedule.

use std::time::{Duration, Instant};

use crate::error_handling::{get_retry_strategy, ProbeError};
use crate::target::Target;

use super::prober::{ProbeResponse, Prober};

/// Retry limits applied to every target.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Bound on each individual attempt
    pub timeout: Duration,
    /// First backoff pause in milliseconds
    pub backoff_ms: u64,
}

/// Final outcome of all attempts against one target.
#[derive(Debug)]
pub struct ProbeAttempts {
    pub outcome: Result<ProbeResponse, ProbeError>,
    /// Number of attempts made, including the first
    pub attempts: u32,
    /// Duration of the last attempt
    pub elapsed: Duration,
}

enum AttemptState {
    Attempt,
    Success(ProbeResponse),
    TransientFailure(ProbeError),
    GiveUp(ProbeError),
}

/// Probes a target, retrying transient failures.
///
/// Every attempt is bounded by `policy.timeout` regardless of the prober, so the
/// worst case for one target is `(retries + 1) * timeout` plus backoff.
pub async fn probe_with_retry(
    prober: &dyn Prober,
    target: &Target,
    policy: &RetryPolicy,
) -> ProbeAttempts {
    let mut backoff = get_retry_strategy(policy.backoff_ms, policy.retries);
    let mut attempts = 0u32;
    let mut elapsed = Duration::ZERO;
    let mut state = AttemptState::Attempt;

    loop {
        state = match state {
            AttemptState::Attempt => {
                attempts += 1;
                let started = Instant::now();
                let result = tokio::time::timeout(policy.timeout, prober.probe(target)).await;
                elapsed = started.elapsed();
                match result {
                    Ok(Ok(response)) => AttemptState::Success(response),
                    Ok(Err(e)) if e.kind.is_transient() => AttemptState::TransientFailure(e),
                    Ok(Err(e)) => AttemptState::GiveUp(e),
                    Err(_) => AttemptState::TransientFailure(ProbeError::timeout(policy.timeout)),
                }
            }
            AttemptState::TransientFailure(error) => match backoff.next() {
                Some(pause) => {
                    log::debug!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempts,
                        target,
                        error,
                        pause
                    );
                    tokio::time::sleep(pause).await;
                    AttemptState::Attempt
                }
                None => AttemptState::GiveUp(error),
            },
            AttemptState::Success(response) => {
                return ProbeAttempts {
                    outcome: Ok(response),
                    attempts,
                    elapsed,
                }
            }
            AttemptState::GiveUp(error) => {
                log::debug!("Giving up on {} after {} attempt(s): {}", target, attempts, error);
                return ProbeAttempts {
                    outcome: Err(error),
                    attempts,
                    elapsed,
                };
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ErrorKind;
    use crate::test_helpers::{subdomain_target, MockBehavior, MockProber};

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            timeout: Duration::from_millis(30),
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let prober = MockProber::new(MockBehavior::Status(200));
        let result = probe_with_retry(&prober, &subdomain_target("www"), &policy(2)).await;
        assert_eq!(result.attempts, 1);
        assert_eq!(result.outcome.unwrap().status, 200);
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test]
    async fn test_every_attempt_times_out() {
        let prober = MockProber::new(MockBehavior::Hang);
        let result = probe_with_retry(&prober, &subdomain_target("slow"), &policy(2)).await;
        assert_eq!(result.attempts, 3);
        assert_eq!(prober.calls(), 3);
        assert_eq!(result.outcome.unwrap_err().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let prober = MockProber::new(MockBehavior::FailThenStatus {
            failures: 2,
            kind: ErrorKind::Connect,
            status: 204,
        });
        let result = probe_with_retry(&prober, &subdomain_target("flaky"), &policy(3)).await;
        assert_eq!(result.attempts, 3);
        assert_eq!(result.outcome.unwrap().status, 204);
    }

    #[tokio::test]
    async fn test_non_transient_error_not_retried() {
        let prober = MockProber::new(MockBehavior::Error(ErrorKind::Redirect));
        let result = probe_with_retry(&prober, &subdomain_target("loop"), &policy(5)).await;
        assert_eq!(result.attempts, 1);
        assert_eq!(result.outcome.unwrap_err().kind, ErrorKind::Redirect);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let prober = MockProber::new(MockBehavior::Error(ErrorKind::Connect));
        let result = probe_with_retry(&prober, &subdomain_target("down"), &policy(0)).await;
        assert_eq!(result.attempts, 1);
        assert!(result.outcome.is_err());
    }
}
