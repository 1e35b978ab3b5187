//! Target identity normalization and base target parsing.

use crate::config::DEFAULT_SCHEME;
use crate::error_handling::ValidationError;

/// Normalizes a hostname or URL into the identity used for deduplication,
/// caching and in-flight exclusion.
///
/// Lowercases, drops an `http://`/`https://` scheme and strips trailing slashes, so
/// `HTTPS://Example.com/Admin/` and `example.com/admin` share one identity.
pub fn normalize_identity(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    without_scheme.trim_end_matches('/').to_string()
}

/// The base target split into the parts the generator combines with wordlist entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTarget {
    /// `http` or `https`
    pub scheme: String,
    /// Host, including an explicit port when one was given
    pub host: String,
    /// Path without trailing slash (empty for the site root)
    pub path: String,
}

impl BaseTarget {
    /// Parses a base target such as `example.com`, `http://example.com:8080` or
    /// `https://example.com/app/`.
    ///
    /// The scheme defaults to `https` when absent.
    pub fn parse(base: &str) -> Result<Self, ValidationError> {
        let trimmed = base.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyBaseTarget);
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("{DEFAULT_SCHEME}://{trimmed}")
        };

        let parsed = url::Url::parse(&with_scheme)
            .map_err(|_| ValidationError::InvalidBaseTarget(trimmed.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ValidationError::InvalidBaseTarget(trimmed.to_string()))?;
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(BaseTarget {
            scheme: parsed.scheme().to_string(),
            host,
            path: parsed.path().trim_end_matches('/').to_string(),
        })
    }

    /// `scheme://host`
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}
