//! Periodic process resource sampling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::collector::{MetricsCollector, ResourceSample};

/// Reads CPU, memory and cumulative disk IO of the current process.
pub struct ResourceSampler {
    system: System,
    pid: Option<sysinfo::Pid>,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                log::warn!("Resource sampling unavailable: {}", e);
                None
            }
        };
        ResourceSampler {
            system: System::new(),
            pid,
        }
    }

    /// Takes one sample. CPU usage is relative to the previous call, so the first
    /// reading is usually 0.
    pub fn sample(&mut self) -> Option<ResourceSample> {
        let pid = self.pid?;
        if !self.system.refresh_process(pid) {
            return None;
        }
        let process = self.system.process(pid)?;
        let disk = process.disk_usage();
        Some(ResourceSample {
            timestamp: Utc::now(),
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
            disk_read_bytes: disk.total_read_bytes,
            disk_write_bytes: disk.total_written_bytes,
        })
    }
}

/// Spawns the sampling task. It samples on its own wall-clock interval, independent
/// of probe cadence, until `cancel` fires.
pub fn start_resource_sampler(
    collector: Arc<MetricsCollector>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = ResourceSampler::new();
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(sample) = sampler.sample() {
                        collector.record_resource(sample);
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}
