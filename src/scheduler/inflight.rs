//! Per-target mutual exclusion.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Set of locks keyed by normalized target identity.
///
/// At most one [`InFlightGuard`] exists per key at any time. Entries are created on
/// demand and removed when the last holder or waiter lets go, so the set only ever
/// holds keys that are being probed right now.
#[derive(Default)]
pub struct InFlight {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds `key`, then holds it until the guard drops.
    pub async fn acquire(&self, key: &str) -> InFlightGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        let mut waiting = Waiting {
            owner: self,
            key: key.to_string(),
            wait: Some(lock.lock_owned().boxed()),
        };
        let guard = (&mut waiting).await;
        InFlightGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Drops the entry for `key` once nothing but the map refers to it.
    fn release(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A pending acquisition. Dropping it before the lock is granted (a cancelled
/// worker, a timeout) gives up its claim on the entry.
struct Waiting<'a> {
    owner: &'a InFlight,
    key: String,
    wait: Option<BoxFuture<'static, OwnedMutexGuard<()>>>,
}

impl Future for Waiting<'_> {
    type Output = OwnedMutexGuard<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(wait) = self.wait.as_mut() else {
            return Poll::Pending;
        };
        let guard = std::task::ready!(wait.poll_unpin(cx));
        self.wait = None;
        Poll::Ready(guard)
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.wait.take().is_some() {
            self.owner.release(&self.key);
        }
    }
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the map and any waiters
        drop(self.guard.take());
        self.owner.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let inflight = Arc::new(InFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let inflight = Arc::clone(&inflight);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = inflight.acquire("www.example.com").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let inflight = InFlight::new();
        let a = inflight.acquire("a.example.com").await;
        let b = tokio::time::timeout(Duration::from_millis(50), inflight.acquire("b.example.com"))
            .await
            .expect("a different key must not wait");
        assert_eq!(inflight.len(), 2);
        drop(a);
        drop(b);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let inflight = Arc::new(InFlight::new());
        let first = inflight.acquire("k").await;

        let waiter = {
            let inflight = Arc::clone(&inflight);
            tokio::spawn(async move {
                let _guard = inflight.acquire("k").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);
        waiter.await.unwrap();
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_entry() {
        let inflight = InFlight::new();
        let holder = inflight.acquire("k").await;

        let mut waiter = Box::pin(inflight.acquire("k"));
        assert!((&mut waiter).now_or_never().is_none());
        assert_eq!(inflight.len(), 1);

        // The lock passes to the waiter, which is abandoned before it runs
        drop(holder);
        assert_eq!(inflight.len(), 1);
        drop(waiter);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_waiter_does_not_block_later_acquire() {
        let inflight = InFlight::new();
        let holder = inflight.acquire("k").await;
        let waited =
            tokio::time::timeout(Duration::from_millis(10), inflight.acquire("k")).await;
        assert!(waited.is_err());
        drop(holder);
        assert!(inflight.is_empty());

        let again = tokio::time::timeout(Duration::from_millis(50), inflight.acquire("k"))
            .await
            .expect("entry must be free after the waiter gave up");
        drop(again);
        assert!(inflight.is_empty());
    }
}
