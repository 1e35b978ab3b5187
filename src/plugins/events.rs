//! Notification events.
//!
//! Events are fire-and-forget: every observer owns a bounded channel and emission uses
//! `try_send`, so emitting never waits on a consumer. An observer that falls more than
//! the channel capacity behind loses the overflow; those drops are counted and logged
//! when the bus closes. Observers that dropped their receiver are pruned on the next
//! emission.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::config::{Profile, ScanMode, DEFAULT_EVENT_BUFFER};
use crate::metrics::MetricsSnapshot;
use crate::models::{ProbeResult, ScanStatus};
use crate::report::ReportArtifact;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    ScanStart {
        base_target: String,
        mode: ScanMode,
        profile: Profile,
    },
    /// A result whose status is in the allowed set
    ResultFound { result: ProbeResult },
    /// A result that ended in a probe error
    ResultError { result: ProbeResult },
    ScanEnd {
        status: ScanStatus,
        total_results: usize,
    },
    ReportGenerated { artifact: ReportArtifact },
    MetricsUpdate { snapshot: MetricsSnapshot },
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::ScanStart { .. } => "scan_start",
            EventPayload::ResultFound { .. } => "result_found",
            EventPayload::ResultError { .. } => "result_error",
            EventPayload::ScanEnd { .. } => "scan_end",
            EventPayload::ReportGenerated { .. } => "report_generated",
            EventPayload::MetricsUpdate { .. } => "metrics_update",
        }
    }
}

/// Time spent handing one event kind to every observer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchStats {
    pub count: u64,
    pub mean_us: f64,
    pub min_us: u64,
    pub max_us: u64,
}

#[derive(Default)]
struct DispatchTimer {
    count: u64,
    total_us: u64,
    min_us: Option<u64>,
    max_us: u64,
}

impl DispatchTimer {
    fn record(&mut self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.count += 1;
        self.total_us = self.total_us.saturating_add(us);
        self.min_us = Some(self.min_us.map_or(us, |m| m.min(us)));
        self.max_us = self.max_us.max(us);
    }

    fn stats(&self) -> DispatchStats {
        #[allow(clippy::cast_precision_loss)]
        let mean_us = if self.count > 0 {
            self.total_us as f64 / self.count as f64
        } else {
            0.0
        };
        DispatchStats {
            count: self.count,
            mean_us,
            min_us: self.min_us.unwrap_or(0),
            max_us: self.max_us,
        }
    }
}

struct BusInner {
    capacity: usize,
    subscribers: Mutex<Vec<Sender<Event>>>,
    dropped: AtomicU64,
    dispatch: Mutex<BTreeMap<&'static str, DispatchTimer>>,
}

/// Fan-out of events to any number of observers.
///
/// Cloning the bus shares the observer list, drop counter and dispatch timings.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_BUFFER)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus whose observers each buffer up to `capacity` undelivered events.
    pub fn with_capacity(capacity: usize) -> Self {
        EventBus {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                subscribers: Mutex::new(Vec::new()),
                dropped: AtomicU64::new(0),
                dispatch: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Registers a new observer and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        match self.inner.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(_) => log::warn!("Event bus lock poisoned, observer will receive nothing"),
        }
        rx
    }

    /// Runs `callback` for every event on a dedicated task.
    ///
    /// A panicking callback is logged and skipped; it never affects the emitter or
    /// other observers. The task ends once the bus is closed.
    pub fn observe<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(Event) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = event.kind();
                if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                    log::warn!("Event observer panicked while handling {}", kind);
                }
            }
        })
    }

    /// Publishes an event to every live observer, in emission order.
    pub fn emit(&self, payload: EventPayload) {
        let started = Instant::now();
        let kind = payload.kind();
        let event = Event {
            timestamp: Utc::now(),
            payload,
        };
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
        }
        self.inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .record(started.elapsed());
    }

    pub fn observer_count(&self) -> usize {
        self.inner.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Events lost because an observer's buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Dispatch timings per event kind.
    pub fn dispatch_stats(&self) -> BTreeMap<String, DispatchStats> {
        self.inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(kind, timer)| (kind.to_string(), timer.stats()))
            .collect()
    }

    /// Drops every observer channel. Receivers drain what was already sent, then end.
    pub fn close(&self) {
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.clear();
        }
        let dropped = self.dropped_events();
        if dropped > 0 {
            log::warn!("{} event(s) dropped for observers that fell behind", dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::status_result;

    fn scan_end(total: usize) -> EventPayload {
        EventPayload::ScanEnd {
            status: ScanStatus::Completed,
            total_results: total,
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(EventPayload::ResultFound {
            result: status_result("www", 200, 1),
        });
        bus.emit(scan_end(1));
        bus.close();

        let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["result_found", "scan_end"]);
    }

    #[tokio::test]
    async fn test_dropped_observer_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.observer_count(), 2);
        bus.emit(scan_end(0));
        assert_eq!(bus.observer_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_stop_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = bus.observe(move |event| {
            if let EventPayload::ScanEnd { total_results, .. } = event.payload {
                if total_results == 0 {
                    panic!("observer failure");
                }
                sink.lock().unwrap().push(total_results);
            }
        });

        bus.emit(scan_end(0));
        bus.emit(scan_end(7));
        bus.close();
        handle.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_slow_observer_loses_overflow_only() {
        let bus = EventBus::with_capacity(2);
        let mut slow = bus.subscribe();
        for total in 0..5 {
            bus.emit(scan_end(total));
        }
        assert_eq!(bus.dropped_events(), 3);
        assert_eq!(bus.observer_count(), 1);

        bus.close();
        let received: Vec<usize> = std::iter::from_fn(|| slow.try_recv().ok())
            .filter_map(|e| match e.payload {
                EventPayload::ScanEnd { total_results, .. } => Some(total_results),
                _ => None,
            })
            .collect();
        assert_eq!(received, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_dispatch_stats_per_kind() {
        let bus = EventBus::new();
        let _rx = bus.subscribe();
        bus.emit(EventPayload::ResultFound {
            result: status_result("www", 200, 1),
        });
        bus.emit(EventPayload::ResultError {
            result: status_result("api", 200, 1),
        });
        bus.emit(scan_end(2));
        bus.emit(scan_end(2));

        let stats = bus.dispatch_stats();
        assert_eq!(stats["result_found"].count, 1);
        assert_eq!(stats["result_error"].count, 1);
        let end = &stats["scan_end"];
        assert_eq!(end.count, 2);
        assert!(end.min_us <= end.max_us);
        assert!(end.mean_us <= end.max_us as f64);
        assert!(!stats.contains_key("report_generated"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event {
            timestamp: Utc::now(),
            payload: scan_end(3),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scan_end");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["total_results"], 3);
    }
}
