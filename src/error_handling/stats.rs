//! Processing statistics tracking.
//!
//! Thread-safe counters for probe error kinds and for the non-fatal faults that a
//! scan absorbs (plugin faults, cache persistence faults, report write faults).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;

use super::types::ErrorKind;

/// Non-fatal faults that degrade a scan without stopping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum FaultType {
    PluginLoad,
    PluginResult,
    PluginPostScan,
    CacheLoad,
    CacheSave,
    ReportWrite,
}

impl FaultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultType::PluginLoad => "Plugin on_load fault",
            FaultType::PluginResult => "Plugin on_result fault",
            FaultType::PluginPostScan => "Plugin post_scan fault",
            FaultType::CacheLoad => "Cache load fault",
            FaultType::CacheSave => "Cache save fault",
            FaultType::ReportWrite => "Report write fault",
        }
    }
}

/// Thread-safe processing statistics tracker.
///
/// Every [`ErrorKind`] and [`FaultType`] is initialized to zero on creation, so the
/// maps are never mutated after construction and can be shared through `Arc`
/// without a lock.
pub struct ProcessingStats {
    errors: HashMap<ErrorKind, AtomicUsize>,
    faults: HashMap<FaultType, AtomicUsize>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        let errors = ErrorKind::iter()
            .map(|kind| (kind, AtomicUsize::new(0)))
            .collect();
        let faults = FaultType::iter()
            .map(|fault| (fault, AtomicUsize::new(0)))
            .collect();
        ProcessingStats { errors, faults }
    }

    pub fn increment_error(&self, kind: ErrorKind) {
        if let Some(counter) = self.errors.get(&kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!("Error counter for {:?} missing from ProcessingStats", kind);
        }
    }

    pub fn increment_fault(&self, fault: FaultType) {
        if let Some(counter) = self.faults.get(&fault) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!("Fault counter for {:?} missing from ProcessingStats", fault);
        }
    }

    pub fn get_error_count(&self, kind: ErrorKind) -> usize {
        self.errors
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn get_fault_count(&self, fault: FaultType) -> usize {
        self.faults
            .get(&fault)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get total error count across all error kinds.
    pub fn total_errors(&self) -> usize {
        ErrorKind::iter().map(|e| self.get_error_count(e)).sum()
    }

    /// Get total fault count across all fault types.
    pub fn total_faults(&self) -> usize {
        FaultType::iter().map(|f| self.get_fault_count(f)).sum()
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}
