//! Request rate limiting.
//!
//! A token bucket refilled by a background ticker. Workers take one token per
//! network probe; cache hits never touch the limiter.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

const REFILL_TICK: Duration = Duration::from_millis(100);

pub struct RateLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
    rps: u32,
}

impl RateLimiter {
    /// Waits for a token. Tokens are consumed, not returned.
    pub async fn acquire(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }

    pub fn rps(&self) -> u32 {
        self.rps
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Starts a token-bucket rate limiter.
///
/// Returns `None` when `rps` is 0 (unlimited). The returned token stops the refill
/// task; the limiter keeps handing out whatever tokens remain.
pub fn init_rate_limiter(rps: u32, burst: usize) -> Option<(Arc<RateLimiter>, CancellationToken)> {
    if rps == 0 {
        return None;
    }
    let capacity = burst.max(1);
    let shutdown = CancellationToken::new();
    let limiter = Arc::new(RateLimiter {
        permits: Arc::new(Semaphore::new(capacity)),
        capacity,
        rps,
    });

    let permits = Arc::clone(&limiter.permits);
    let stop = shutdown.clone();
    let mut ticker = interval(REFILL_TICK);
    tokio::spawn(async move {
        let mut last = tokio::time::Instant::now();
        let mut carry = 0.0f64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = tokio::time::Instant::now();
                    #[allow(clippy::cast_precision_loss)]
                    let due = f64::from(rps) * now.duration_since(last).as_secs_f64() + carry;
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let whole = due as usize;
                    #[allow(clippy::cast_precision_loss)]
                    {
                        carry = due - whole as f64;
                    }
                    // Never fill past the burst capacity
                    let room = capacity.saturating_sub(permits.available_permits());
                    let add = whole.min(room);
                    if add > 0 {
                        permits.add_permits(add);
                    }
                    last = now;
                }
                _ = stop.cancelled() => {
                    log::debug!("Rate limiter refill task shutting down");
                    break;
                }
            }
        }
    });

    Some((limiter, shutdown))
}
