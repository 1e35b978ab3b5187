//! Report writer task.
//!
//! A single task owns all report I/O. Jobs arrive on a bounded channel (producers
//! wait when it is full) and are flushed in batches of `write_batch_size`, or when
//! `write_interval_seconds` passes, whichever comes first. Every flush ends with a
//! retention pass.
//!
//! A file that cannot be rendered or written (after one retry) is replaced by a
//! plain-text `<stem>_fallback.txt` summary so the scan still leaves a trace on disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

use super::retention::{enforce_retention, RetentionOutcome};
use super::ReportArtifact;
use crate::config::{ReportFormat, ReportSettings, BYTES_PER_MB};
use crate::error_handling::{FaultType, ProcessingStats, ReportError};
use crate::plugins::{EventBus, EventPayload};

/// One rendered file waiting to be written.
pub struct WriteJob {
    /// File name without extension
    pub stem: String,
    pub format: ReportFormat,
    /// Rendered contents, or why rendering failed
    pub rendered: Result<Vec<u8>, String>,
    /// Summary written in place of the artifact if it cannot be produced
    pub fallback: String,
}

enum JobOutcome {
    Written(ReportArtifact),
    Failed {
        message: String,
        fallback: Option<PathBuf>,
    },
}

/// Everything the writer did over its lifetime.
#[derive(Debug, Default)]
pub struct WriterSummary {
    pub artifacts: Vec<ReportArtifact>,
    /// Non-fatal write and retention faults
    pub warnings: Vec<String>,
    /// Artifacts deleted by retention
    pub removed: Vec<PathBuf>,
    /// Fallback summaries written for files that failed
    pub fallbacks: Vec<PathBuf>,
}

struct ReportWriter {
    dir: PathBuf,
    settings: ReportSettings,
    buffer: Vec<WriteJob>,
    last_flush: Instant,
    summary: WriterSummary,
    events: EventBus,
    stats: Arc<ProcessingStats>,
}

impl ReportWriter {
    async fn add_job(&mut self, job: WriteJob) {
        self.buffer.push(job);
        if self.buffer.len() >= self.settings.write_batch_size {
            self.flush().await;
        }
    }

    fn should_flush_by_time(&self) -> bool {
        self.last_flush.elapsed().as_secs() >= self.settings.write_interval_seconds
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let jobs = std::mem::take(&mut self.buffer);
        let count = jobs.len();
        log::debug!("Flushing {} report file(s) to {}", count, self.dir.display());

        let dir = self.dir.clone();
        let settings = self.settings.clone();
        let flushed = tokio::task::spawn_blocking(move || {
            let written: Vec<_> = jobs
                .iter()
                .map(|job| process_job(&dir, &settings, job))
                .collect();
            let retention = enforce_retention(&dir, &settings, SystemTime::now());
            (written, retention)
        })
        .await;

        let (written, retention) = match flushed {
            Ok(flushed) => flushed,
            Err(e) => {
                self.warn(format!("report flush of {count} file(s) failed: {e}"));
                return;
            }
        };

        for outcome in written {
            match outcome {
                JobOutcome::Written(artifact) => {
                    log::info!(
                        "Wrote {} report {} ({} bytes{})",
                        artifact.format,
                        artifact.path.display(),
                        artifact.size_bytes,
                        if artifact.compressed { ", gzip" } else { "" }
                    );
                    self.events.emit(EventPayload::ReportGenerated {
                        artifact: artifact.clone(),
                    });
                    self.summary.artifacts.push(artifact);
                }
                JobOutcome::Failed { message, fallback } => {
                    if let Some(path) = fallback {
                        if !self.summary.fallbacks.contains(&path) {
                            self.summary.fallbacks.push(path);
                        }
                    }
                    self.warn(message);
                }
            }
        }

        match retention {
            Ok(RetentionOutcome {
                removed, failures, ..
            }) => {
                self.summary
                    .artifacts
                    .retain(|artifact| !removed.contains(&artifact.path));
                self.summary.removed.extend(removed);
                for failure in failures {
                    self.warn(format!("retention could not delete {failure}"));
                }
            }
            Err(e) => self.warn(format!("retention pass failed: {e}")),
        }

        self.last_flush = Instant::now();
    }

    fn warn(&mut self, message: String) {
        log::warn!("Report write fault: {}", message);
        self.stats.increment_fault(FaultType::ReportWrite);
        self.summary.warnings.push(message);
    }
}

fn process_job(dir: &Path, settings: &ReportSettings, job: &WriteJob) -> JobOutcome {
    let failure = match &job.rendered {
        Ok(bytes) => match write_with_retry(dir, settings, job, bytes) {
            Ok(artifact) => return JobOutcome::Written(artifact),
            Err(message) => message,
        },
        Err(e) => format!(
            "{}.{}: rendering failed: {}",
            job.stem,
            job.format.extension(),
            e
        ),
    };

    match write_fallback(dir, job) {
        Ok(path) => {
            log::info!("Saved fallback report {}", path.display());
            JobOutcome::Failed {
                message: format!("{failure} (fallback saved to {})", path.display()),
                fallback: Some(path),
            }
        }
        Err(e) => {
            log::error!("Saving fallback report for {} failed: {}", job.stem, e);
            JobOutcome::Failed {
                message: format!("{failure} (fallback failed: {e})"),
                fallback: None,
            }
        }
    }
}

fn write_with_retry(
    dir: &Path,
    settings: &ReportSettings,
    job: &WriteJob,
    bytes: &[u8],
) -> Result<ReportArtifact, String> {
    write_job(dir, settings, job, bytes).or_else(|first| {
        log::warn!(
            "Writing {} report {} failed ({}), retrying once",
            job.format,
            job.stem,
            first
        );
        write_job(dir, settings, job, bytes)
            .map_err(|second| format!("{}.{}: {}", job.stem, job.format.extension(), second))
    })
}

/// Writes `bytes` to `tmp` and renames it to `path`. The temp file never outlives a
/// failure.
fn write_atomically(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let written = std::fs::write(tmp, bytes).and_then(|()| std::fs::rename(tmp, path));
    if written.is_err() && tmp.exists() {
        if let Err(e) = std::fs::remove_file(tmp) {
            log::warn!("Could not remove temp file {}: {}", tmp.display(), e);
        }
    }
    written
}

/// Writes to a hidden temp file and renames it into place, then compresses large
/// artifacts.
fn write_job(
    dir: &Path,
    settings: &ReportSettings,
    job: &WriteJob,
    bytes: &[u8],
) -> Result<ReportArtifact, ReportError> {
    let name = format!("{}.{}", job.stem, job.format.extension());
    let path = dir.join(&name);
    let tmp = dir.join(format!(".{name}.tmp"));
    write_atomically(&tmp, &path, bytes)?;

    let mut artifact = ReportArtifact {
        format: job.format,
        path,
        size_bytes: bytes.len() as u64,
        created_at: Utc::now(),
        compressed: false,
    };

    let threshold = settings.compression_threshold_mb.saturating_mul(BYTES_PER_MB);
    if settings.compression && artifact.size_bytes > threshold {
        match compress_file(&artifact.path, bytes) {
            Ok((gz_path, gz_size)) => {
                artifact.path = gz_path;
                artifact.size_bytes = gz_size;
                artifact.compressed = true;
            }
            Err(e) => log::warn!(
                "Compressing {} failed, keeping it uncompressed: {}",
                artifact.path.display(),
                e
            ),
        }
    }

    Ok(artifact)
}

/// Gzips `bytes` next to `path` (adding `.gz`) and removes the original.
fn compress_file(path: &Path, bytes: &[u8]) -> Result<(PathBuf, u64), ReportError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    let compressed = encoder.finish()?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let gz_path = path.with_file_name(format!("{file_name}.gz"));
    let tmp = path.with_file_name(format!(".{file_name}.gz.tmp"));
    write_atomically(&tmp, &gz_path, &compressed)?;
    std::fs::remove_file(path)?;

    Ok((gz_path, compressed.len() as u64))
}

fn write_fallback(dir: &Path, job: &WriteJob) -> std::io::Result<PathBuf> {
    let name = format!("{}_fallback.txt", job.stem);
    let path = dir.join(&name);
    let tmp = dir.join(format!(".{name}.tmp"));
    write_atomically(&tmp, &path, job.fallback.as_bytes())?;
    Ok(path)
}

/// Starts the writer task.
///
/// Returns the bounded job sender and a handle resolving to the writer's summary
/// once every sender is dropped and the final batch is flushed.
pub fn start_report_writer(
    dir: PathBuf,
    settings: ReportSettings,
    events: EventBus,
    stats: Arc<ProcessingStats>,
) -> (
    mpsc::Sender<WriteJob>,
    tokio::task::JoinHandle<WriterSummary>,
) {
    let (tx, mut rx) = mpsc::channel(settings.max_write_queue.max(1));
    let flush_interval = Duration::from_secs(settings.write_interval_seconds.max(1));
    let mut writer = ReportWriter {
        dir,
        settings,
        buffer: Vec::new(),
        last_flush: Instant::now(),
        summary: WriterSummary::default(),
        events,
        stats,
    };

    let handle = tokio::spawn(async move {
        let mut interval_timer = interval(flush_interval);

        loop {
            tokio::select! {
                job = rx.recv() => {
                    match job {
                        Some(job) => writer.add_job(job).await,
                        None => {
                            log::debug!("Report writer channel closed, flushing remaining files");
                            writer.flush().await;
                            return writer.summary;
                        }
                    }
                }
                _ = interval_timer.tick() => {
                    if writer.should_flush_by_time() && !writer.buffer.is_empty() {
                        writer.flush().await;
                    }
                }
            }
        }
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use futures::FutureExt;
    use std::io::Read;
    use tempfile::TempDir;

    fn job(stem: &str, format: ReportFormat, bytes: &[u8]) -> WriteJob {
        WriteJob {
            stem: stem.to_string(),
            format,
            rendered: Ok(bytes.to_vec()),
            fallback: format!("FALLBACK REPORT (original format: {format})\n"),
        }
    }

    fn start(
        dir: &Path,
        settings: ReportSettings,
    ) -> (mpsc::Sender<WriteJob>, tokio::task::JoinHandle<WriterSummary>) {
        start_report_writer(
            dir.to_path_buf(),
            settings,
            EventBus::new(),
            Arc::new(ProcessingStats::new()),
        )
    }

    #[tokio::test]
    async fn test_writes_and_renames() {
        let dir = TempDir::new().unwrap();
        let settings = ReportSettings {
            compression: false,
            ..Default::default()
        };
        let (tx, handle) = start(dir.path(), settings);
        tx.send(job("report_a", ReportFormat::Json, b"{}")).await.unwrap();
        drop(tx);
        let summary = handle.await.unwrap();

        assert_eq!(summary.artifacts.len(), 1);
        assert!(summary.warnings.is_empty());
        let path = dir.path().join("report_a.json");
        assert_eq!(summary.artifacts[0].path, path);
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!dir.path().join(".report_a.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_large_artifact_compressed() {
        let dir = TempDir::new().unwrap();
        let settings = ReportSettings {
            compression: true,
            compression_threshold_mb: 0,
            ..Default::default()
        };
        let (tx, handle) = start(dir.path(), settings);
        let body = "id,value\n".repeat(500);
        tx.send(job("report_big", ReportFormat::Csv, body.as_bytes()))
            .await
            .unwrap();
        drop(tx);
        let summary = handle.await.unwrap();

        let artifact = &summary.artifacts[0];
        assert!(artifact.compressed);
        assert_eq!(artifact.path, dir.path().join("report_big.csv.gz"));
        assert!(!dir.path().join("report_big.csv").exists());

        let mut decoded = String::new();
        GzDecoder::new(std::fs::File::open(&artifact.path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn test_batch_flushes_before_close() {
        let dir = TempDir::new().unwrap();
        let settings = ReportSettings {
            compression: false,
            write_batch_size: 2,
            write_interval_seconds: 3600,
            ..Default::default()
        };
        let (tx, handle) = start(dir.path(), settings);
        tx.send(job("report_1", ReportFormat::Json, b"1")).await.unwrap();
        tx.send(job("report_2", ReportFormat::Json, b"2")).await.unwrap();

        let mut flushed = false;
        for _ in 0..50 {
            if dir.path().join("report_2.json").exists() {
                flushed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(flushed, "a full batch should flush without waiting for the interval");
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_becomes_warning() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let stats = Arc::new(ProcessingStats::new());
        let (tx, handle) = start_report_writer(
            missing,
            ReportSettings::default(),
            EventBus::new(),
            Arc::clone(&stats),
        );
        tx.send(job("report_x", ReportFormat::Json, b"{}")).await.unwrap();
        drop(tx);
        let summary = handle.await.unwrap();

        assert!(summary.artifacts.is_empty());
        assert!(!summary.warnings.is_empty());
        assert!(stats.get_fault_count(FaultType::ReportWrite) >= 1);
    }

    #[tokio::test]
    async fn test_retention_runs_after_flush() {
        let dir = TempDir::new().unwrap();
        let settings = ReportSettings {
            compression: false,
            max_reports: 2,
            ..Default::default()
        };
        let (tx, handle) = start(dir.path(), settings);
        for i in 0..4 {
            tx.send(job(&format!("report_{i}"), ReportFormat::Json, b"{}"))
                .await
                .unwrap();
        }
        drop(tx);
        let summary = handle.await.unwrap();

        let remaining = super::super::retention::list_artifacts(dir.path()).unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(summary.removed.len(), 2);
        assert_eq!(summary.artifacts.len(), 2);
    }

    #[tokio::test]
    async fn test_emits_report_generated() {
        let dir = TempDir::new().unwrap();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let (tx, handle) = start_report_writer(
            dir.path().to_path_buf(),
            ReportSettings::default(),
            events,
            Arc::new(ProcessingStats::new()),
        );
        tx.send(job("report_e", ReportFormat::Html, b"<html></html>"))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind(), "report_generated");
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_temp_and_writes_fallback() {
        let dir = TempDir::new().unwrap();
        // A directory squatting on the final name makes every rename fail
        std::fs::create_dir(dir.path().join("report_x.json")).unwrap();
        let stats = Arc::new(ProcessingStats::new());
        let (tx, handle) = start_report_writer(
            dir.path().to_path_buf(),
            ReportSettings::default(),
            EventBus::new(),
            Arc::clone(&stats),
        );
        tx.send(job("report_x", ReportFormat::Json, b"{}")).await.unwrap();
        drop(tx);
        let summary = handle.await.unwrap();

        assert!(summary.artifacts.is_empty());
        assert_eq!(summary.warnings.len(), 1);
        assert!(!dir.path().join(".report_x.json.tmp").exists());
        let fallback = dir.path().join("report_x_fallback.txt");
        assert_eq!(summary.fallbacks, vec![fallback.clone()]);
        let text = std::fs::read_to_string(&fallback).unwrap();
        assert!(text.starts_with("FALLBACK REPORT (original format: json)"));
        assert!(!dir.path().join(".report_x_fallback.txt.tmp").exists());
        assert_eq!(stats.get_fault_count(FaultType::ReportWrite), 1);
    }

    #[tokio::test]
    async fn test_render_failure_writes_fallback_only() {
        let dir = TempDir::new().unwrap();
        let (tx, handle) = start(dir.path(), ReportSettings::default());
        tx.send(WriteJob {
            stem: "report_bad".to_string(),
            format: ReportFormat::Csv,
            rendered: Err("CSV rendering error".to_string()),
            fallback: "FALLBACK REPORT (original format: csv)\n".to_string(),
        })
        .await
        .unwrap();
        drop(tx);
        let summary = handle.await.unwrap();

        assert!(summary.artifacts.is_empty());
        assert!(summary.warnings[0].contains("rendering failed"));
        assert!(!dir.path().join("report_bad.csv").exists());
        assert!(dir.path().join("report_bad_fallback.txt").exists());
    }

    #[tokio::test]
    async fn test_full_queue_blocks_producer() {
        let dir = TempDir::new().unwrap();
        let settings = ReportSettings {
            compression: false,
            max_write_queue: 1,
            ..Default::default()
        };
        let (tx, handle) = start(dir.path(), settings);
        // The writer has not been polled yet, so nothing drains the queue
        tx.try_send(job("report_1", ReportFormat::Json, b"1")).unwrap();
        assert!(matches!(
            tx.try_send(job("report_2", ReportFormat::Json, b"2")),
            Err(mpsc::error::TrySendError::Full(_))
        ));
        assert!(
            tx.reserve().now_or_never().is_none(),
            "a full queue must make producers wait"
        );

        tx.send(job("report_2", ReportFormat::Json, b"2")).await.unwrap();
        drop(tx);
        let summary = handle.await.unwrap();
        assert_eq!(summary.artifacts.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_flushes_partial_batch() {
        let dir = TempDir::new().unwrap();
        let settings = ReportSettings {
            compression: false,
            write_batch_size: 10,
            write_interval_seconds: 5,
            ..Default::default()
        };
        let events = EventBus::new();
        let mut generated = events.subscribe();
        let (tx, handle) = start_report_writer(
            dir.path().to_path_buf(),
            settings,
            events,
            Arc::new(ProcessingStats::new()),
        );
        let path = dir.path().join("report_tick.json");

        tx.send(job("report_tick", ReportFormat::Json, b"{}")).await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!path.exists(), "one job is below the batch size");

        tokio::time::advance(Duration::from_secs(6)).await;
        let event = generated.recv().await.expect("interval flush");
        assert_eq!(event.kind(), "report_generated");
        assert!(path.exists());

        drop(tx);
        let summary = handle.await.unwrap();
        assert_eq!(summary.artifacts.len(), 1);
    }
}
