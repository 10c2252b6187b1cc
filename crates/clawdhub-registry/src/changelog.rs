//! Auto-changelog seam.
//!
//! When a publish arrives with a blank changelog, the registry asks an
//! external summarizer for a short markdown entry. The summarizer sees the
//! previous and the new file manifests.

use crate::types::FileEntry;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// External `manifest diff -> short markdown` summarizer.
#[async_trait]
pub trait ChangelogSummarizer: Send + Sync {
    async fn summarize(
        &self,
        previous: Option<&[FileEntry]>,
        current: &[FileEntry],
    ) -> Result<String>;
}

/// Deterministic fallback summarizer: counts added, changed, and removed
/// files by comparing manifests.
#[derive(Default)]
pub struct BasicSummarizer;

#[async_trait]
impl ChangelogSummarizer for BasicSummarizer {
    async fn summarize(
        &self,
        previous: Option<&[FileEntry]>,
        current: &[FileEntry],
    ) -> Result<String> {
        let Some(previous) = previous else {
            return Ok("Initial release".to_string());
        };

        let prev: BTreeMap<&str, &str> = previous
            .iter()
            .map(|f| (f.path.as_str(), f.sha256.as_str()))
            .collect();
        let curr: BTreeMap<&str, &str> = current
            .iter()
            .map(|f| (f.path.as_str(), f.sha256.as_str()))
            .collect();

        let added = curr.keys().filter(|p| !prev.contains_key(**p)).count();
        let removed = prev.keys().filter(|p| !curr.contains_key(**p)).count();
        let changed = curr
            .iter()
            .filter(|(p, sha)| prev.get(**p).is_some_and(|old| old != *sha))
            .count();

        let mut parts = Vec::new();
        if added > 0 {
            parts.push(format!("{added} file(s) added"));
        }
        if changed > 0 {
            parts.push(format!("{changed} file(s) changed"));
        }
        if removed > 0 {
            parts.push(format!("{removed} file(s) removed"));
        }
        if parts.is_empty() {
            return Ok("No file changes".to_string());
        }
        Ok(parts.join(", "))
    }
}
