//! Scan housekeeping.
//!
//! This module provides progress logging, shutdown of background tasks and the
//! statistics printed when a scan ends.

pub mod logging;
pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use logging::{log_progress, start_progress_logger};
pub use shutdown::shutdown_gracefully;
pub use statistics::{
    print_error_statistics, print_event_statistics, print_scan_summary, print_timing_statistics,
};
