//! Report rendering, persistence and retention.
//!
//! The store renders a [`ReportDocument`] in every format its profile selects,
//! queues the files for the single writer task and hands back what was written
//! when it is finished. Write faults never lose results: they become warnings
//! while the in-memory results stay with the caller, and a plain-text fallback
//! summary is saved in place of the missing file.
//!
//! Retention runs once when the store opens and again after every flush.

mod render;
mod retention;
mod writer;

pub use render::{
    escape_html, profile_metrics, render, render_fallback, ReportDocument, ResultRow,
};
pub use retention::{enforce_retention, is_artifact_name, list_artifacts, RetentionOutcome};
pub use writer::WriterSummary;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{Profile, ReportFormat, ReportSettings, REPORT_FILE_PREFIX};
use crate::error_handling::{FaultType, ProcessingStats, ReportError};
use crate::plugins::EventBus;
use writer::{start_report_writer, WriteJob};

const MAX_SLUG_LEN: usize = 64;

/// A persisted report file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportArtifact {
    pub format: ReportFormat,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Gzip-compressed (`.gz` appended to the name)
    pub compressed: bool,
}

/// File-name-safe form of a target.
fn slug(target: &str) -> String {
    let mut slug: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    slug.truncate(MAX_SLUG_LEN);
    let trimmed = slug.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "scan".to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct ReportStore {
    dir: PathBuf,
    formats: Vec<ReportFormat>,
    sequence: AtomicU64,
    tx: mpsc::Sender<WriteJob>,
    handle: JoinHandle<WriterSummary>,
    /// What the retention pass at open did
    opened: WriterSummary,
}

impl ReportStore {
    /// Creates the report directory, prunes it to the retention limits and starts
    /// the writer task.
    ///
    /// A failed prune is a warning reported by [`ReportStore::finish`].
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Io` if the directory cannot be created.
    pub fn open(
        dir: &Path,
        profile: Profile,
        settings: &ReportSettings,
        events: EventBus,
        stats: Arc<ProcessingStats>,
    ) -> Result<Self, ReportError> {
        std::fs::create_dir_all(dir)?;

        let mut opened = WriterSummary::default();
        match enforce_retention(dir, settings, SystemTime::now()) {
            Ok(outcome) => {
                if !outcome.removed.is_empty() {
                    log::info!(
                        "Removed {} old report(s) from {}",
                        outcome.removed.len(),
                        dir.display()
                    );
                }
                opened.removed = outcome.removed;
                for failure in outcome.failures {
                    opened
                        .warnings
                        .push(format!("retention could not delete {failure}"));
                }
            }
            Err(e) => opened.warnings.push(format!("retention pass failed: {e}")),
        }
        for warning in &opened.warnings {
            log::warn!("Report write fault: {}", warning);
            stats.increment_fault(FaultType::ReportWrite);
        }

        let (tx, handle) = start_report_writer(dir.to_path_buf(), settings.clone(), events, stats);
        Ok(ReportStore {
            dir: dir.to_path_buf(),
            formats: profile.formats(&settings.enabled_formats),
            sequence: AtomicU64::new(0),
            tx,
            handle,
            opened,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Formats rendered for every submitted document.
    pub fn formats(&self) -> &[ReportFormat] {
        &self.formats
    }

    fn next_stem(&self, document: &ReportDocument) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut stem = format!(
            "{}{}_{}",
            REPORT_FILE_PREFIX,
            slug(&document.target),
            document.generated_at.format("%Y%m%d_%H%M%S_%6f")
        );
        if seq > 0 {
            stem.push_str(&format!("_{seq}"));
        }
        stem
    }

    /// Renders the document in every profile format and queues the files.
    ///
    /// Waits while the write queue is full. Returns the number of files queued. A
    /// format that fails to render is queued as its fallback summary.
    pub async fn submit(&self, document: &ReportDocument) -> Result<usize, ReportError> {
        let stem = self.next_stem(document);
        for &format in &self.formats {
            let rendered = render(document, format).map_err(|e| {
                log::error!("Rendering {} report failed: {}", format, e);
                e.to_string()
            });
            self.tx
                .send(WriteJob {
                    stem: stem.clone(),
                    format,
                    rendered,
                    fallback: render_fallback(document, format),
                })
                .await
                .map_err(|_| ReportError::WriterClosed)?;
        }
        Ok(self.formats.len())
    }

    /// Flushes pending files, runs a final retention pass and stops the writer.
    pub async fn finish(self) -> WriterSummary {
        drop(self.tx);
        let mut summary = self.opened;
        match self.handle.await {
            Ok(written) => {
                summary.artifacts = written.artifacts;
                summary.warnings.extend(written.warnings);
                summary.removed.extend(written.removed);
                summary.fallbacks = written.fallbacks;
            }
            Err(e) => summary
                .warnings
                .push(format!("report writer task failed: {e}")),
        }
        summary
    }
}
