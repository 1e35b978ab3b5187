//! Scan configuration and constants.
//!
//! This module provides:
//! - Configuration constants (defaults, limits, intervals)
//! - The [`Config`] record handed to `run_scan`
//! - Report profiles

mod constants;
mod profile;
mod types;

// Re-export all constants
pub use constants::*;
pub use profile::{MetricKey, Profile};
pub use types::{
    Config, LogFormat, LogLevel, ProbeMethod, ReportFormat, ReportSettings, ScanMode,
};
