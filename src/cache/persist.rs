//! Opt-in cache persistence across scans.

use anyhow::{Context, Result};
use std::path::Path;

use super::{CacheEntry, ProbeCache};

/// Loads saved cache entries from disk.
///
/// A missing file is not an error; it simply yields no entries.
pub fn load_from_file(path: &Path) -> Result<Vec<CacheEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).context("Failed to read cache file")?;
    let entries: Vec<CacheEntry> =
        serde_json::from_str(&content).context("Failed to parse cache file")?;
    Ok(entries)
}

/// Saves the cache to disk, replacing any previous file atomically.
pub fn save_to_file(path: &Path, cache: &ProbeCache) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
    }

    let entries = cache.entries();
    let content = serde_json::to_string(&entries).context("Failed to serialize cache")?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).context("Failed to write cache file")?;
    std::fs::rename(&tmp, path).context("Failed to replace cache file")?;

    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanMode;
    use crate::models::ProbeResult;
    use crate::target::Target;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let entries = load_from_file(&dir.path().join("absent.json")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = ProbeCache::new(8);
        let target = Target::new("api.example.com", "https://api.example.com", ScanMode::Subdomain);
        cache.insert(ProbeResult::from_status(&target, 200, Some("text/html".into()), None, 7, 1));

        assert_eq!(save_to_file(&path, &cache).unwrap(), 1);
        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded, cache.entries());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_from_file(&path).is_err());
    }
}
