//! Probe targets.
//!
//! A [`Target`] is one candidate hostname or URL derived from the base target and a
//! single wordlist entry. Targets compare and hash by their normalized identity.

mod generator;
mod normalize;

pub use generator::TargetGenerator;
pub use normalize::{normalize_identity, BaseTarget};

use serde::{Deserialize, Serialize};

use crate::config::ScanMode;

/// Whether a target was built as a subdomain or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Subdomain,
    Directory,
}

impl From<ScanMode> for TargetKind {
    fn from(mode: ScanMode) -> Self {
        match mode {
            ScanMode::Subdomain => TargetKind::Subdomain,
            ScanMode::Directory => TargetKind::Directory,
        }
    }
}

/// A single candidate to probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Hostname (subdomain mode) or URL (directory mode) as generated
    pub raw: String,
    /// Normalized identity used for caching and exclusion
    pub identity: String,
    /// Absolute URL requested by the prober
    pub url: String,
    pub kind: TargetKind,
}

impl Target {
    pub fn new(raw: impl Into<String>, url: impl Into<String>, mode: ScanMode) -> Self {
        let raw = raw.into();
        Target {
            identity: normalize_identity(&raw),
            raw,
            url: url.into(),
            kind: mode.into(),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Target {}

impl std::hash::Hash for Target {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_equality_uses_identity() {
        let a = Target::new("WWW.example.com", "https://WWW.example.com", ScanMode::Subdomain);
        let b = Target::new("www.example.com", "http://www.example.com", ScanMode::Subdomain);
        assert_eq!(a, b);
        assert_eq!(a.identity, "www.example.com");
        assert_eq!(a.to_string(), "WWW.example.com");
    }
}
