//! Where every recorded result goes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::UnboundedSender;

use crate::error_handling::ProcessingStats;
use crate::metrics::MetricsCollector;
use crate::models::ProbeResult;
use crate::plugins::{EventBus, EventPayload, PluginHost};

/// Runs the `on_result` chain, then folds the final value into metrics, the event
/// bus, the optional live sink and the ordered result list.
///
/// Found results raise `result_found` and failed probes raise `result_error`; a
/// status outside the allowed set is recorded without an event.
///
/// Called on the worker that produced the result.
pub struct ResultPipeline {
    plugins: Arc<PluginHost>,
    metrics: Arc<MetricsCollector>,
    events: EventBus,
    stats: Arc<ProcessingStats>,
    sink: Option<UnboundedSender<ProbeResult>>,
    results: Mutex<Vec<ProbeResult>>,
    recorded: AtomicUsize,
}

impl ResultPipeline {
    pub fn new(
        plugins: Arc<PluginHost>,
        metrics: Arc<MetricsCollector>,
        events: EventBus,
        stats: Arc<ProcessingStats>,
        sink: Option<UnboundedSender<ProbeResult>>,
    ) -> Self {
        ResultPipeline {
            plugins,
            metrics,
            events,
            stats,
            sink,
            results: Mutex::new(Vec::new()),
            recorded: AtomicUsize::new(0),
        }
    }

    pub fn handle(&self, result: ProbeResult) {
        let result = self.plugins.on_result(result);

        if let Some(kind) = result.error_kind() {
            self.stats.increment_error(kind);
        }
        self.metrics.record(&result);
        if result.found {
            self.events.emit(EventPayload::ResultFound {
                result: result.clone(),
            });
        } else if result.is_error() {
            self.events.emit(EventPayload::ResultError {
                result: result.clone(),
            });
        }
        if let Some(sink) = &self.sink {
            // A closed sink only means nobody is watching the live stream any more
            let _ = sink.send(result.clone());
        }

        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
        self.recorded.fetch_add(1, Ordering::SeqCst);
    }

    /// Results recorded so far.
    pub fn recorded(&self) -> usize {
        self.recorded.load(Ordering::SeqCst)
    }

    /// Takes the recorded results in the order they were recorded.
    pub fn take_results(&self) -> Vec<ProbeResult> {
        std::mem::take(&mut *self.results.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ErrorKind;
    use crate::plugins::Plugin;
    use crate::test_helpers::{error_result, status_result};

    #[tokio::test]
    async fn test_plugin_output_reaches_every_consumer() {
        let stats = Arc::new(ProcessingStats::new());
        let plugins = PluginHost::load(
            vec![Plugin::new("mark").with_on_result(|r| {
                let mut r = r.clone();
                r.found = true;
                Ok(r)
            })],
            Arc::clone(&stats),
        );
        let metrics = Arc::new(MetricsCollector::new());
        let events = EventBus::new();
        let mut observed = events.subscribe();
        let (tx, mut sink) = tokio::sync::mpsc::unbounded_channel();
        let pipeline = ResultPipeline::new(
            Arc::new(plugins),
            Arc::clone(&metrics),
            events,
            Arc::clone(&stats),
            Some(tx),
        );

        pipeline.handle(status_result("www", 404, 12));
        pipeline.handle(error_result("down", ErrorKind::Connect));

        assert_eq!(pipeline.recorded(), 2);
        assert_eq!(metrics.snapshot().found_count, 2);
        assert_eq!(stats.get_error_count(ErrorKind::Connect), 1);
        assert!(sink.recv().await.is_some_and(|r| r.found));
        let event = observed.recv().await.expect("result event");
        assert_eq!(event.kind(), "result_found");
        // The plugin marked the failed result found as well
        let event = observed.recv().await.expect("second result event");
        assert_eq!(event.kind(), "result_found");

        let results = pipeline.take_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].target, "www.example.com");
        assert!(pipeline.take_results().is_empty());
    }

    #[tokio::test]
    async fn test_events_follow_result_kind() {
        let stats = Arc::new(ProcessingStats::new());
        let events = EventBus::new();
        let mut observed = events.subscribe();
        let pipeline = ResultPipeline::new(
            Arc::new(PluginHost::load(Vec::new(), Arc::clone(&stats))),
            Arc::new(MetricsCollector::new()),
            events.clone(),
            stats,
            None,
        );

        let mut found = status_result("www", 200, 3);
        found.found = true;
        pipeline.handle(found);
        pipeline.handle(status_result("missing", 404, 3));
        pipeline.handle(error_result("down", ErrorKind::Timeout));
        events.close();

        let mut seen = Vec::new();
        while let Some(event) = observed.recv().await {
            let target = match &event.payload {
                EventPayload::ResultFound { result } | EventPayload::ResultError { result } => {
                    result.target.clone()
                }
                _ => continue,
            };
            seen.push((event.kind(), target));
        }
        assert_eq!(
            seen,
            vec![
                ("result_found", "www.example.com".to_string()),
                ("result_error", "down.example.com".to_string()),
            ]
        );
        assert_eq!(pipeline.recorded(), 3);
    }
}
