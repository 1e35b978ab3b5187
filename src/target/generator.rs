//! Target generation from a base target and a wordlist.

use std::collections::HashSet;

use crate::config::ScanMode;

use super::normalize::BaseTarget;
use super::Target;

/// Lazily combines a base target with wordlist lines.
///
/// Lines are trimmed; blank lines and `#` comments are skipped; entries whose
/// normalized identity was already produced are dropped. The generator is as
/// restartable as the iterator it wraps.
pub struct TargetGenerator<I> {
    base: BaseTarget,
    mode: ScanMode,
    lines: I,
    seen: HashSet<String>,
}

impl<I, S> TargetGenerator<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    pub fn new<W>(base: BaseTarget, mode: ScanMode, wordlist: W) -> Self
    where
        W: IntoIterator<Item = S, IntoIter = I>,
    {
        TargetGenerator {
            base,
            mode,
            lines: wordlist.into_iter(),
            seen: HashSet::new(),
        }
    }

    fn build(&self, entry: &str) -> Target {
        match self.mode {
            ScanMode::Subdomain => {
                let host = format!("{}.{}", entry.trim_matches('.'), self.base.host);
                let url = format!("{}://{}", self.base.scheme, host);
                Target::new(host, url, self.mode)
            }
            ScanMode::Directory => {
                let url = format!(
                    "{}{}/{}",
                    self.base.origin(),
                    self.base.path,
                    entry.trim_start_matches('/')
                );
                Target::new(url.clone(), url, self.mode)
            }
        }
    }
}

impl<I, S> Iterator for TargetGenerator<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Target;

    fn next(&mut self) -> Option<Target> {
        loop {
            let line = self.lines.next()?;
            let entry = line.as_ref().trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }

            let target = self.build(entry);
            if self.seen.insert(target.identity.clone()) {
                return Some(target);
            }
            log::debug!("Skipping duplicate wordlist entry: {}", entry);
        }
    }
}
