//! Probe result and scan outcome models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error_handling::{ErrorKind, ProbeError};
use crate::target::Target;

/// What a probe observed: an HTTP status, or the error that ended it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Status { code: u16 },
    Error { kind: ErrorKind, message: String },
}

/// Terminal state of a scan that started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Every submitted target produced a result
    Completed,
    /// Stopped before every target produced a result
    Interrupted,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Completed => f.write_str("completed"),
            ScanStatus::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// The recorded outcome for one target.
///
/// Plugins transform results by value; a recorded result is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Target as generated (hostname or URL)
    pub target: String,
    /// Normalized identity of the target
    pub identity: String,
    pub outcome: ProbeOutcome,
    /// Wall time of the final attempt in milliseconds
    pub elapsed_ms: u64,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Network attempts made, including the first
    pub attempt_count: u32,
    /// Status code is in the configured allowed set
    pub found: bool,
    /// Served from the cache rather than probed in this scan
    #[serde(default)]
    pub from_cache: bool,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Builds a result for a target that answered with an HTTP status.
    pub fn from_status(
        target: &Target,
        code: u16,
        content_type: Option<String>,
        content_length: Option<u64>,
        elapsed_ms: u64,
        attempt_count: u32,
    ) -> Self {
        ProbeResult {
            target: target.raw.clone(),
            identity: target.identity.clone(),
            outcome: ProbeOutcome::Status { code },
            elapsed_ms,
            content_type,
            content_length,
            attempt_count,
            found: false,
            from_cache: false,
            timestamp: Utc::now(),
        }
    }

    /// Builds a failed result from the error of the final attempt.
    pub fn from_error(
        target: &Target,
        error: ProbeError,
        elapsed_ms: u64,
        attempt_count: u32,
    ) -> Self {
        ProbeResult {
            target: target.raw.clone(),
            identity: target.identity.clone(),
            outcome: ProbeOutcome::Error {
                kind: error.kind,
                message: error.message,
            },
            elapsed_ms,
            content_type: None,
            content_length: None,
            attempt_count,
            found: false,
            from_cache: false,
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self.outcome {
            ProbeOutcome::Status { code } => Some(code),
            ProbeOutcome::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.outcome {
            ProbeOutcome::Status { .. } => None,
            ProbeOutcome::Error { kind, .. } => Some(kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Status { .. } => None,
            ProbeOutcome::Error { message, .. } => Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_kind().is_some()
    }

    /// Key used by the status histogram: the status code, or the error kind.
    pub fn histogram_key(&self) -> String {
        match &self.outcome {
            ProbeOutcome::Status { code } => code.to_string(),
            ProbeOutcome::Error { kind, .. } => kind.as_str().to_string(),
        }
    }

    /// Copy of this result marked as served from the cache.
    pub fn as_cache_hit(&self) -> Self {
        ProbeResult {
            from_cache: true,
            ..self.clone()
        }
    }
}
