//! Error type definitions.
//!
//! This module defines the error taxonomy used throughout the scanner: fatal
//! configuration errors, per-probe failures, plugin faults and report write faults.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::config::{Profile, ReportFormat};

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// A configuration or target that cannot be scanned.
///
/// Raised before any probing starts.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("at least one report format must be enabled")]
    NoFormatsEnabled,

    #[error("profile '{profile}' renders {format}, which is not an enabled format")]
    FormatNotEnabled {
        profile: Profile,
        format: ReportFormat,
    },

    #[error("invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("base target is empty")]
    EmptyBaseTarget,

    #[error("invalid base target '{0}'")]
    InvalidBaseTarget(String),
}

/// Fatal errors that prevent a scan from starting.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("plugin '{plugin}' aborted the scan: {reason}")]
    PluginAborted { plugin: String, reason: String },

    #[error(transparent)]
    Initialization(#[from] InitializationError),
}

/// Classification of a failed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Connect,
    Request,
    Redirect,
    Body,
    Decode,
    Builder,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connect => "connect",
            ErrorKind::Request => "request",
            ErrorKind::Redirect => "redirect",
            ErrorKind::Body => "body",
            ErrorKind::Decode => "decode",
            ErrorKind::Builder => "builder",
            ErrorKind::Other => "other",
        }
    }

    /// Whether another attempt might succeed.
    ///
    /// Timeouts and connection-level failures are transient; everything else is a
    /// property of the target or the request and is not retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Connect | ErrorKind::Request
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed probe attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct ProbeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }
}

/// Fault raised by a plugin hook.
#[derive(Error, Debug, Clone)]
pub enum PluginError {
    /// The hook returned an error.
    #[error("{0}")]
    Failed(String),

    /// The hook panicked.
    #[error("panicked: {0}")]
    Panicked(String),

    /// `pre_scan` asked for the scan to be aborted.
    #[error("aborted: {0}")]
    Aborted(String),
}

impl From<anyhow::Error> for PluginError {
    fn from(e: anyhow::Error) -> Self {
        PluginError::Failed(format!("{e:#}"))
    }
}

/// Error types for report rendering and persistence.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON rendering error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV rendering error: {0}")]
    Csv(#[from] csv::Error),

    #[error("report writer is no longer running")]
    WriterClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::Connect.is_transient());
        assert!(ErrorKind::Request.is_transient());
        assert!(!ErrorKind::Redirect.is_transient());
        assert!(!ErrorKind::Decode.is_transient());
        assert!(!ErrorKind::Other.is_transient());
    }

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::timeout(std::time::Duration::from_millis(1500));
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.to_string(), "timeout error: no response within 1500ms");
    }

    #[test]
    fn test_scan_error_messages() {
        let err = ScanError::from(ValidationError::ZeroValue("threads"));
        assert_eq!(
            err.to_string(),
            "invalid configuration: threads must be greater than zero"
        );

        let err = ScanError::PluginAborted {
            plugin: "scope".into(),
            reason: "out of scope".into(),
        };
        assert!(err.to_string().contains("scope"));
    }

    #[test]
    fn test_plugin_error_from_anyhow() {
        let err: PluginError = anyhow::anyhow!("boom").context("on_result").into();
        assert!(matches!(err, PluginError::Failed(ref m) if m.contains("boom")));
    }
}
