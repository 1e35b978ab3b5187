//! Error handling and processing statistics.
//!
//! This module provides:
//! - Error type definitions (fatal scan errors, probe errors, plugin and report faults)
//! - Probe error categorization and the retry backoff schedule
//! - Processing statistics tracking (error kinds, absorbed faults)
//!
//! Only [`ValidationError`] and a `pre_scan` plugin abort stop a scan; every other
//! failure is counted here and the scan carries on.

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{categorize_reqwest_error, get_retry_strategy};
pub use stats::{FaultType, ProcessingStats};
pub use types::{
    ErrorKind, InitializationError, PluginError, ProbeError, ReportError, ScanError,
    ValidationError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_processing_stats_initialization() {
        let stats = ProcessingStats::new();
        for kind in ErrorKind::iter() {
            assert_eq!(stats.get_error_count(kind), 0);
        }
        for fault in FaultType::iter() {
            assert_eq!(stats.get_fault_count(fault), 0);
        }
    }

    #[test]
    fn test_processing_stats_increment() {
        let stats = ProcessingStats::new();
        stats.increment_error(ErrorKind::Timeout);
        stats.increment_error(ErrorKind::Timeout);
        stats.increment_error(ErrorKind::Connect);
        stats.increment_fault(FaultType::PluginResult);

        assert_eq!(stats.get_error_count(ErrorKind::Timeout), 2);
        assert_eq!(stats.total_errors(), 3);
        assert_eq!(stats.total_faults(), 1);
    }
}
