//! Report profiles.
//!
//! A profile is a fixed bundle of metrics and output formats. Each variant maps to
//! exactly one record; there is no runtime merging of profile dictionaries.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter as EnumIterMacro;

use super::types::ReportFormat;

/// Named bundle selecting which metrics and formats a scan produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Request/found/error counters, JSON only
    Minimal,
    /// Adds response times and status codes, JSON and HTML
    Standard,
    /// Every collected metric in every enabled format
    Complete,
}

/// A metric group that can appear in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    TotalRequests,
    FoundCount,
    Errors,
    ResponseTimes,
    StatusCodes,
    ContentTypes,
    ErrorKinds,
    CacheHits,
    Resources,
    Duration,
}

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::TotalRequests => "total_requests",
            MetricKey::FoundCount => "found_count",
            MetricKey::Errors => "errors",
            MetricKey::ResponseTimes => "response_times",
            MetricKey::StatusCodes => "status_codes",
            MetricKey::ContentTypes => "content_types",
            MetricKey::ErrorKinds => "error_kinds",
            MetricKey::CacheHits => "cache_hits",
            MetricKey::Resources => "resources",
            MetricKey::Duration => "duration",
        }
    }
}

const MINIMAL_METRICS: &[MetricKey] = &[
    MetricKey::TotalRequests,
    MetricKey::FoundCount,
    MetricKey::Errors,
];

const STANDARD_METRICS: &[MetricKey] = &[
    MetricKey::TotalRequests,
    MetricKey::FoundCount,
    MetricKey::Errors,
    MetricKey::ResponseTimes,
    MetricKey::StatusCodes,
];

impl Profile {
    /// Metric groups included in reports for this profile.
    pub fn metrics(&self) -> Vec<MetricKey> {
        use strum::IntoEnumIterator;
        match self {
            Profile::Minimal => MINIMAL_METRICS.to_vec(),
            Profile::Standard => STANDARD_METRICS.to_vec(),
            Profile::Complete => MetricKey::iter().collect(),
        }
    }

    /// Formats rendered for this profile.
    ///
    /// `enabled` only widens `Complete`; the fixed profiles keep their own set so that
    /// configuration validation can flag a disabled format.
    pub fn formats(&self, enabled: &[ReportFormat]) -> Vec<ReportFormat> {
        match self {
            Profile::Minimal => vec![ReportFormat::Json],
            Profile::Standard => vec![ReportFormat::Json, ReportFormat::Html],
            Profile::Complete => {
                let mut formats = enabled.to_vec();
                formats.sort();
                formats.dedup();
                formats
            }
        }
    }

    pub fn includes(&self, metric: MetricKey) -> bool {
        self.metrics().contains(&metric)
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Profile::Minimal => "minimal",
            Profile::Standard => "standard",
            Profile::Complete => "complete",
        };
        f.write_str(name)
    }
}
