//! Result aggregation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::median::StreamingMedian;
use crate::config::MAX_RESOURCE_SAMPLES;
use crate::models::ProbeResult;

/// One process resource reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    /// Process CPU usage; may exceed 100 on multi-core hosts
    pub cpu_percent: f32,
    /// Resident set size in bytes
    pub memory_bytes: u64,
    /// Bytes the process has read from disk since it started
    pub disk_read_bytes: u64,
    /// Bytes the process has written to disk since it started
    pub disk_write_bytes: u64,
}

/// Means over every resource sample taken during the scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceAverages {
    pub samples: u64,
    pub cpu_percent: f64,
    pub memory_bytes: f64,
    pub disk_read_bytes: f64,
    pub disk_write_bytes: f64,
}

#[derive(Default)]
struct ResourceTotals {
    samples: u64,
    cpu_percent: f64,
    memory_bytes: f64,
    disk_read_bytes: f64,
    disk_write_bytes: f64,
}

impl ResourceTotals {
    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, sample: &ResourceSample) {
        self.samples += 1;
        self.cpu_percent += f64::from(sample.cpu_percent);
        self.memory_bytes += sample.memory_bytes as f64;
        self.disk_read_bytes += sample.disk_read_bytes as f64;
        self.disk_write_bytes += sample.disk_write_bytes as f64;
    }

    #[allow(clippy::cast_precision_loss)]
    fn averages(&self) -> ResourceAverages {
        if self.samples == 0 {
            return ResourceAverages::default();
        }
        let n = self.samples as f64;
        ResourceAverages {
            samples: self.samples,
            cpu_percent: self.cpu_percent / n,
            memory_bytes: self.memory_bytes / n,
            disk_read_bytes: self.disk_read_bytes / n,
            disk_write_bytes: self.disk_write_bytes / n,
        }
    }
}

/// Timing summary over network probes (cache hits excluded).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseTimes {
    pub count: u64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Immutable view of the collected metrics at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub found_count: u64,
    pub errors: u64,
    pub cache_hits: u64,
    /// Histogram keyed by status code, or by error kind for failed probes
    pub status_codes: BTreeMap<String, u64>,
    pub response_times: ResponseTimes,
    pub content_types: BTreeMap<String, u64>,
    pub errors_by_kind: BTreeMap<String, u64>,
    /// Most recent samples, at most `MAX_RESOURCE_SAMPLES`
    pub resources: Vec<ResourceSample>,
    pub resource_averages: ResourceAverages,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

#[derive(Default)]
struct MetricsState {
    total_requests: u64,
    found_count: u64,
    errors: u64,
    cache_hits: u64,
    status_codes: BTreeMap<String, u64>,
    content_types: BTreeMap<String, u64>,
    errors_by_kind: BTreeMap<String, u64>,
    timing_count: u64,
    timing_sum_ms: u64,
    timing_min_ms: Option<u64>,
    timing_max_ms: u64,
    median: StreamingMedian,
    resources: Vec<ResourceSample>,
    resource_totals: ResourceTotals,
    finished_at: Option<DateTime<Utc>>,
}

/// Lock-protected accumulator, one update per forwarded result.
pub struct MetricsCollector {
    started_at: DateTime<Utc>,
    state: Mutex<MetricsState>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Media type without parameters, lowercased. `None` for an empty header.
pub fn normalize_content_type(raw: &str) -> Option<String> {
    let media = raw.split(';').next().unwrap_or("").trim().to_lowercase();
    (!media.is_empty()).then_some(media)
}

impl MetricsCollector {
    pub fn new() -> Self {
        MetricsCollector {
            started_at: Utc::now(),
            state: Mutex::new(MetricsState::default()),
        }
    }

    pub fn record(&self, result: &ProbeResult) {
        let Ok(mut state) = self.state.lock() else {
            log::warn!("Metrics lock poisoned, dropping result for {}", result.target);
            return;
        };

        state.total_requests += 1;
        if result.found {
            state.found_count += 1;
        }
        *state.status_codes.entry(result.histogram_key()).or_insert(0) += 1;

        if let Some(kind) = result.error_kind() {
            state.errors += 1;
            *state.errors_by_kind.entry(kind.as_str().to_string()).or_insert(0) += 1;
        }

        if let Some(ct) = result.content_type.as_deref().and_then(normalize_content_type) {
            *state.content_types.entry(ct).or_insert(0) += 1;
        }

        if result.from_cache {
            state.cache_hits += 1;
        } else {
            let ms = result.elapsed_ms;
            state.timing_count += 1;
            state.timing_sum_ms = state.timing_sum_ms.saturating_add(ms);
            state.timing_min_ms = Some(state.timing_min_ms.map_or(ms, |m| m.min(ms)));
            state.timing_max_ms = state.timing_max_ms.max(ms);
            #[allow(clippy::cast_precision_loss)]
            state.median.push(ms as f64);
        }
    }

    pub fn record_resource(&self, sample: ResourceSample) {
        if let Ok(mut state) = self.state.lock() {
            state.resource_totals.add(&sample);
            if state.resources.len() >= MAX_RESOURCE_SAMPLES {
                state.resources.remove(0);
            }
            state.resources.push(sample);
        }
    }

    /// Marks the end of the scan; later snapshots report a fixed duration.
    pub fn finish(&self) -> MetricsSnapshot {
        if let Ok(mut state) = self.state.lock() {
            state.finished_at.get_or_insert_with(Utc::now);
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let Ok(state) = self.state.lock() else {
            return self.empty_snapshot();
        };

        #[allow(clippy::cast_precision_loss)]
        let mean_ms = if state.timing_count > 0 {
            state.timing_sum_ms as f64 / state.timing_count as f64
        } else {
            0.0
        };
        let end = state.finished_at.unwrap_or_else(Utc::now);
        let duration_ms = (end - self.started_at).num_milliseconds().max(0) as u64;

        MetricsSnapshot {
            total_requests: state.total_requests,
            found_count: state.found_count,
            errors: state.errors,
            cache_hits: state.cache_hits,
            status_codes: state.status_codes.clone(),
            response_times: ResponseTimes {
                count: state.timing_count,
                mean_ms,
                median_ms: state.median.estimate().unwrap_or(0.0),
                min_ms: state.timing_min_ms.unwrap_or(0),
                max_ms: state.timing_max_ms,
            },
            content_types: state.content_types.clone(),
            errors_by_kind: state.errors_by_kind.clone(),
            resources: state.resources.clone(),
            resource_averages: state.resource_totals.averages(),
            started_at: self.started_at,
            finished_at: state.finished_at,
            duration_ms,
        }
    }

    fn empty_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: 0,
            found_count: 0,
            errors: 0,
            cache_hits: 0,
            status_codes: BTreeMap::new(),
            response_times: ResponseTimes::default(),
            content_types: BTreeMap::new(),
            errors_by_kind: BTreeMap::new(),
            resources: Vec::new(),
            resource_averages: ResourceAverages::default(),
            started_at: self.started_at,
            finished_at: None,
            duration_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ErrorKind;
    use crate::test_helpers::{error_result, status_result};

    #[test]
    fn test_content_type_normalization() {
        assert_eq!(
            normalize_content_type("Text/HTML; charset=UTF-8").as_deref(),
            Some("text/html")
        );
        assert_eq!(normalize_content_type("  "), None);
    }

    #[test]
    fn test_records_status_and_errors() {
        let collector = MetricsCollector::new();
        let mut found = status_result("www", 200, 10);
        found.found = true;
        collector.record(&found);
        collector.record(&status_result("api", 404, 30));
        collector.record(&error_result("dead", ErrorKind::Timeout));

        let snap = collector.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.found_count, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.status_codes.get("200"), Some(&1));
        assert_eq!(snap.status_codes.get("404"), Some(&1));
        assert_eq!(snap.status_codes.get("timeout"), Some(&1));
        assert_eq!(snap.errors_by_kind.get("timeout"), Some(&1));
        assert_eq!(snap.content_types.get("text/html"), Some(&2));
    }

    #[test]
    fn test_timing_summary() {
        let collector = MetricsCollector::new();
        for (label, ms) in [("a", 10), ("b", 20), ("c", 60)] {
            collector.record(&status_result(label, 200, ms));
        }
        let times = collector.snapshot().response_times;
        assert_eq!(times.count, 3);
        assert_eq!(times.mean_ms, 30.0);
        assert_eq!(times.median_ms, 20.0);
        assert_eq!(times.min_ms, 10);
        assert_eq!(times.max_ms, 60);
    }

    #[test]
    fn test_cache_hits_excluded_from_timing() {
        let collector = MetricsCollector::new();
        collector.record(&status_result("a", 200, 100));
        collector.record(&status_result("a", 200, 100).as_cache_hit());
        let snap = collector.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.response_times.count, 1);
    }

    #[test]
    fn test_finish_freezes_end_time() {
        let collector = MetricsCollector::new();
        let first = collector.finish();
        let second = collector.finish();
        assert!(first.finished_at.is_some());
        assert_eq!(first.finished_at, second.finished_at);
        assert_eq!(first.duration_ms, second.duration_ms);
    }

    #[test]
    fn test_resource_samples_bounded() {
        let collector = MetricsCollector::new();
        for i in 0..(MAX_RESOURCE_SAMPLES + 5) {
            collector.record_resource(ResourceSample {
                timestamp: Utc::now(),
                cpu_percent: 1.0,
                memory_bytes: i as u64,
                disk_read_bytes: 0,
                disk_write_bytes: 0,
            });
        }
        let resources = collector.snapshot().resources;
        assert_eq!(resources.len(), MAX_RESOURCE_SAMPLES);
        assert_eq!(resources[0].memory_bytes, 5);
    }

    #[test]
    fn test_resource_averages_cover_every_sample() {
        let collector = MetricsCollector::new();
        for (cpu, memory, read, write) in [(10.0, 100, 1000, 0), (30.0, 300, 3000, 400)] {
            collector.record_resource(ResourceSample {
                timestamp: Utc::now(),
                cpu_percent: cpu,
                memory_bytes: memory,
                disk_read_bytes: read,
                disk_write_bytes: write,
            });
        }
        let averages = collector.snapshot().resource_averages;
        assert_eq!(averages.samples, 2);
        assert_eq!(averages.cpu_percent, 20.0);
        assert_eq!(averages.memory_bytes, 200.0);
        assert_eq!(averages.disk_read_bytes, 2000.0);
        assert_eq!(averages.disk_write_bytes, 200.0);
    }

    #[test]
    fn test_no_samples_average_to_zero() {
        let averages = MetricsCollector::new().snapshot().resource_averages;
        assert_eq!(averages, ResourceAverages::default());
    }
}
