//! Scan metrics.
//!
//! This module provides:
//! - [`MetricsCollector`], folding every forwarded result into counters, a status
//!   histogram and a timing summary with a streaming median
//! - A resource sampler recording process CPU, memory and disk IO on a fixed interval
//! - [`MetricsSnapshot`], the immutable view handed to events and reports

mod collector;
mod median;
mod sampler;

pub use collector::{
    normalize_content_type, MetricsCollector, MetricsSnapshot, ResourceAverages, ResourceSample,
    ResponseTimes,
};
pub use median::StreamingMedian;
pub use sampler::{start_resource_sampler, ResourceSampler};
