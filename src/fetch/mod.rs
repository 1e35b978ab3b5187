//! Probe execution.
//!
//! This module provides:
//! - The [`Prober`] seam and its `reqwest`-backed implementation
//! - The retry state machine that turns attempts into one final outcome

mod prober;
mod retry;

pub use prober::{HttpProber, ProbeResponse, Prober};
pub use retry::{probe_with_retry, ProbeAttempts, RetryPolicy};
