//! Fingerprint resolution.
//!
//! Maps `(slug, 64-hex bundle fingerprint)` to a previously published
//! version. This is what makes CLI `sync` and `update` idempotent: a
//! client that holds the same bytes as a published version learns which
//! version it is without re-publishing. The resolver is a pure read.

use crate::errors::Result;
use crate::fingerprint::{bundle_fingerprint, is_hex_digest};
use crate::registry::Registry;

/// Fingerprint index rows consulted before falling back to recomputation.
const FINGERPRINT_ROW_LIMIT: usize = 25;

/// Versions recomputed in the fallback scan, newest first.
const RECOMPUTE_VERSION_LIMIT: usize = 200;

/// Resolver output: the matching version (if any) and the skill's
/// current latest version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub match_version: Option<String>,
    pub latest_version: Option<String>,
}

impl Registry {
    /// Resolve a bundle fingerprint against a skill's published versions.
    ///
    /// Missing or soft-deleted skills, and malformed hashes, resolve to
    /// the empty outcome rather than an error.
    pub async fn resolve_fingerprint(&self, slug: &str, hash: &str) -> Result<ResolveOutcome> {
        if !is_hex_digest(hash) {
            return Ok(ResolveOutcome::default());
        }

        let skill = match self.store.get_skill_by_slug(slug).await? {
            Some(s) if !s.is_soft_deleted() => s,
            _ => return Ok(ResolveOutcome::default()),
        };

        let latest_version = match &skill.latest_version_id {
            Some(id) => self.store.get_version(id).await?.map(|v| v.version),
            None => None,
        };

        // Primary path: the fingerprint index, newest row first.
        let rows = self
            .store
            .fingerprints_for(&skill.id, hash, FINGERPRINT_ROW_LIMIT)
            .await?;
        for row in rows {
            if let Some(version) = self.store.get_version(&row.version_id).await? {
                if version.soft_deleted_at.is_none() {
                    return Ok(ResolveOutcome {
                        match_version: Some(version.version),
                        latest_version,
                    });
                }
            }
        }

        // Fallback: recompute fingerprints from the file manifests,
        // newest version first. First equality wins.
        let page = self
            .store
            .list_versions(&skill.id, RECOMPUTE_VERSION_LIMIT, None)
            .await?;
        for version in page.items {
            if version.soft_deleted_at.is_some() {
                continue;
            }
            let pairs: Vec<(&str, &str)> = version
                .files
                .iter()
                .map(|f| (f.path.as_str(), f.sha256.as_str()))
                .collect();
            if bundle_fingerprint(&pairs) == hash {
                return Ok(ResolveOutcome {
                    match_version: Some(version.version),
                    latest_version,
                });
            }
        }

        Ok(ResolveOutcome { match_version: None, latest_version })
    }
}
