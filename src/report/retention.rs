//! Report directory retention.
//!
//! Only files that look like report artifacts (`report_` prefix and a known
//! extension, fallback summaries included) are counted or deleted; anything else in
//! the directory is left alone.
//! An artifact's age is taken from its modification time, which is set once when
//! the writer renames it into place.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::{ReportSettings, BYTES_PER_MB, REPORT_FILE_PREFIX};

const ARTIFACT_EXTENSIONS: &[&str] = &["json", "html", "csv", "gz", "txt"];
const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// A report artifact found on disk.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created: SystemTime,
}

pub fn is_artifact_name(name: &str) -> bool {
    name.starts_with(REPORT_FILE_PREFIX)
        && Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext))
}

/// Lists artifacts in `dir`, oldest first.
pub fn list_artifacts(dir: &Path) -> std::io::Result<Vec<StoredArtifact>> {
    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_artifact_name(name) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        artifacts.push(StoredArtifact {
            path: entry.path(),
            size_bytes: metadata.len(),
            created: metadata.modified()?,
        });
    }
    artifacts.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));
    Ok(artifacts)
}

/// What a retention pass did.
#[derive(Debug, Default)]
pub struct RetentionOutcome {
    pub removed: Vec<PathBuf>,
    /// Deletions that failed; the artifact is still on disk
    pub failures: Vec<String>,
    pub remaining_count: usize,
    pub remaining_bytes: u64,
}

/// Applies the age, count and size limits to `dir`.
///
/// Artifacts older than `max_age_days` go first. Then the oldest artifacts are
/// deleted until both the count and the total size are within limits.
pub fn enforce_retention(
    dir: &Path,
    settings: &ReportSettings,
    now: SystemTime,
) -> std::io::Result<RetentionOutcome> {
    let artifacts = list_artifacts(dir)?;
    let max_age = Duration::from_secs(settings.max_age_days.saturating_mul(SECS_PER_DAY));
    let max_bytes = settings.max_dir_size_mb.saturating_mul(BYTES_PER_MB);

    let mut outcome = RetentionOutcome::default();
    let mut kept = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let age = now.duration_since(artifact.created).unwrap_or(Duration::ZERO);
        if age > max_age {
            remove(&artifact, "older than max_age_days", &mut outcome, &mut kept);
        } else {
            kept.push(artifact);
        }
    }

    let mut total: u64 = kept.iter().map(|a| a.size_bytes).sum();
    let mut survivors = Vec::with_capacity(kept.len());
    let mut remaining = kept.len();
    for artifact in std::mem::take(&mut kept) {
        if remaining > settings.max_reports || total > max_bytes {
            let size = artifact.size_bytes;
            let before = outcome.removed.len();
            remove(&artifact, "over count or size limit", &mut outcome, &mut survivors);
            if outcome.removed.len() > before {
                total = total.saturating_sub(size);
                remaining -= 1;
            }
        } else {
            survivors.push(artifact);
        }
    }

    outcome.remaining_count = survivors.len();
    outcome.remaining_bytes = survivors.iter().map(|a| a.size_bytes).sum();
    Ok(outcome)
}

fn remove(
    artifact: &StoredArtifact,
    reason: &str,
    outcome: &mut RetentionOutcome,
    kept: &mut Vec<StoredArtifact>,
) {
    match std::fs::remove_file(&artifact.path) {
        Ok(()) => {
            log::debug!("Removed report {} ({})", artifact.path.display(), reason);
            outcome.removed.push(artifact.path.clone());
        }
        Err(e) => {
            log::warn!("Failed to remove report {}: {}", artifact.path.display(), e);
            outcome
                .failures
                .push(format!("{}: {}", artifact.path.display(), e));
            kept.push(artifact.clone());
        }
    }
}
