//! The publish pipeline.
//!
//! Accepts a new version of a skill and persists it atomically with its
//! embedding, fingerprint entry, tag updates, and lineage. Every external
//! read (blob fetch, embedding vector, auto-changelog) completes before
//! the first durable write, so a provider failure leaves no visible
//! state. The version row is written before the skill patch that moves
//! `tags["latest"]`, so a reader that observes the tag can always resolve
//! the version.

use crate::errors::{RegistryError, Result};
use crate::fingerprint::{bundle_fingerprint, is_hex_digest, sha256_hex};
use crate::frontmatter::{parse_skill_md, SkillMd};
use crate::registry::Registry;
use crate::textfiles::{is_allowed, is_markdown, is_skill_md, sanitize_path};
use crate::types::{
    new_id, BadgeKind, ChangelogSource, FileEntry, ForkKind, ForkOf, ModerationStatus, Skill,
    SkillEmbedding, SkillStats, SkillVersion, User, VersionFingerprint, Visibility,
    EMBEDDING_TEXT_LIMIT, LATEST_TAG, MAX_BUNDLE_BYTES,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One file of an incoming bundle. The blob is already in the object
/// store (uploaded inline or via a prior upload-url flow).
#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: String,
    pub size: u64,
    pub storage_id: String,
    pub sha256: String,
    pub content_type: Option<String>,
}

/// Upstream reference supplied by an explicit fork publish.
#[derive(Debug, Clone)]
pub struct ForkOfRequest {
    pub slug: String,
    pub version: Option<String>,
}

/// Input contract of the publish pipeline.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub slug: String,
    pub display_name: String,
    pub version: String,
    pub changelog: String,
    pub tags: Vec<String>,
    pub fork_of: Option<ForkOfRequest>,
    /// Optional provenance string ("cli", "web", ...), logged only.
    pub source: Option<String>,
    pub files: Vec<NewFile>,
}

/// What a successful publish returns to the caller.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub skill_id: String,
    pub version_id: String,
    pub slug: String,
    pub version: String,
    pub fingerprint: String,
    pub created_skill: bool,
}

/// Whether `slug` is lowercase url-safe: `^[a-z0-9][a-z0-9-]*$`.
pub fn is_valid_slug(slug: &str) -> bool {
    let mut bytes = slug.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_lowercase() || b.is_ascii_digit() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl Registry {
    /// Publish a new version. See the module docs for the I/O ordering
    /// contract.
    pub async fn publish(&self, actor: &User, request: PublishRequest) -> Result<PublishOutcome> {
        let now = Utc::now();

        // -- validation, in order; each failure is fatal --

        if !is_valid_slug(&request.slug) {
            return Err(RegistryError::validation(format!(
                "invalid slug '{}': must match ^[a-z0-9][a-z0-9-]*$",
                request.slug
            )));
        }
        let display_name = request.display_name.trim();
        if display_name.is_empty() {
            return Err(RegistryError::validation("displayName must not be empty"));
        }
        let version = semver::Version::parse(&request.version)
            .map_err(|e| RegistryError::validation(format!("invalid semver '{}': {e}", request.version)))?
            .to_string();

        for file in &request.files {
            sanitize_path(&file.path).map_err(RegistryError::Validation)?;
            if !is_hex_digest(&file.sha256) {
                return Err(RegistryError::validation(format!(
                    "file '{}' has a malformed sha256",
                    file.path
                )));
            }
        }

        for file in &request.files {
            if !is_allowed(&file.path, file.content_type.as_deref()) {
                return Err(RegistryError::UnsupportedFileType { path: file.path.clone() });
            }
        }

        let total_size: u64 = request.files.iter().map(|f| f.size).sum();
        if total_size > MAX_BUNDLE_BYTES {
            return Err(RegistryError::BundleTooLarge { size: total_size, limit: MAX_BUNDLE_BYTES });
        }

        let skill_md_files: Vec<&NewFile> =
            request.files.iter().filter(|f| is_skill_md(&f.path)).collect();
        if skill_md_files.len() != 1 {
            return Err(RegistryError::MissingSkillMd);
        }
        let skill_md_entry = skill_md_files[0];

        let existing = self.store.get_skill_by_slug(&request.slug).await?;
        if let Some(skill) = &existing {
            if skill.owner_user_id != actor.id {
                // Moderators cannot publish on behalf of others either.
                return Err(RegistryError::forbidden(format!(
                    "slug '{}' is owned by another user",
                    request.slug
                )));
            }
            if self.store.find_version(&skill.id, &version).await?.is_some() {
                return Err(RegistryError::VersionExists {
                    slug: request.slug.clone(),
                    version: version.clone(),
                });
            }
        }

        // -- external reads: everything fallible happens before any write --

        let skill_md_bytes = self.objects.get(&skill_md_entry.storage_id).await?;
        if sha256_hex(&skill_md_bytes) != skill_md_entry.sha256 {
            return Err(RegistryError::validation(format!(
                "declared sha256 of '{}' does not match its stored bytes",
                skill_md_entry.path
            )));
        }
        let skill_md = parse_skill_md(&String::from_utf8_lossy(&skill_md_bytes))?;

        let embedding_text = self
            .build_embedding_text(&skill_md, &request.files, skill_md_entry)
            .await?;

        let pairs: Vec<(&str, &str)> = request
            .files
            .iter()
            .map(|f| (f.path.as_str(), f.sha256.as_str()))
            .collect();
        let fingerprint = bundle_fingerprint(&pairs);

        let skill_id = existing
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_else(new_id);

        let lineage = self
            .determine_lineage(&request, existing.as_ref(), &skill_id, &fingerprint)
            .await?;

        let vector = self
            .embeddings
            .embed_documents(vec![embedding_text])
            .await
            .map_err(|e| RegistryError::EmbeddingUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RegistryError::EmbeddingUnavailable("provider returned no vector".to_string())
            })?;

        let file_entries: Vec<FileEntry> = request
            .files
            .iter()
            .map(|f| FileEntry {
                path: f.path.clone(),
                size: f.size,
                sha256: f.sha256.clone(),
                storage_id: f.storage_id.clone(),
                content_type: f.content_type.clone(),
            })
            .collect();

        let previous_latest = match existing.as_ref().and_then(|s| s.latest_version_id.clone()) {
            Some(id) => self.store.get_version(&id).await?,
            None => None,
        };
        let (changelog, changelog_source) = if request.changelog.trim().is_empty() {
            let generated = self
                .changelog
                .summarize(
                    previous_latest.as_ref().map(|v| v.files.as_slice()),
                    &file_entries,
                )
                .await;
            match generated {
                Ok(text) => (text, ChangelogSource::Auto),
                Err(e) => {
                    warn!(slug = %request.slug, error = %e, "auto-changelog failed");
                    (String::new(), ChangelogSource::Auto)
                }
            }
        } else {
            (request.changelog.clone(), ChangelogSource::User)
        };

        // -- durable writes, in dependency order --

        let created_skill = existing.is_none();
        let mut skill = existing.unwrap_or_else(|| Skill {
            id: skill_id.clone(),
            slug: request.slug.clone(),
            display_name: display_name.to_string(),
            summary: None,
            owner_user_id: actor.id.clone(),
            latest_version_id: None,
            tags: BTreeMap::new(),
            canonical_skill_id: None,
            fork_of: None,
            moderation_status: ModerationStatus::Active,
            soft_deleted_at: None,
            report_count: 0,
            stats: SkillStats::default(),
            created_at: now,
            updated_at: now,
        });
        if created_skill {
            self.store.put_skill(&skill).await?;
        }

        let version_id = new_id();
        let version_row = SkillVersion {
            id: version_id.clone(),
            skill_id: skill_id.clone(),
            version: version.clone(),
            changelog,
            changelog_source,
            files: file_entries,
            fingerprint: fingerprint.clone(),
            parsed: skill_md.parsed(),
            created_by: actor.id.clone(),
            created_at: now,
            soft_deleted_at: None,
        };
        self.store.put_version(&version_row).await?;

        self.store
            .put_fingerprint(&VersionFingerprint {
                skill_id: skill_id.clone(),
                version_id: version_id.clone(),
                fingerprint: fingerprint.clone(),
                created_at: now,
            })
            .await?;

        // Demote the previous latest embedding before inserting the new
        // one: at most one row per skill carries is_latest at any time.
        // Publishing also revives a soft-deleted skill, so every row gets
        // its visibility recomputed against the live state.
        let badges = self.store.badges_for_skill(&skill_id).await?;
        let is_approved = badges.iter().any(|b| b.kind == BadgeKind::RedactionApproved);
        for mut embedding in self.store.embeddings_for_skill(&skill_id).await? {
            let was = (embedding.is_latest, embedding.visibility);
            embedding.is_latest = false;
            embedding.refresh_visibility(false);
            if was != (embedding.is_latest, embedding.visibility) {
                embedding.updated_at = now;
                self.store.put_embedding(&embedding).await?;
            }
        }
        self.store
            .put_embedding(&SkillEmbedding {
                id: new_id(),
                skill_id: skill_id.clone(),
                version_id: version_id.clone(),
                owner_id: skill.owner_user_id.clone(),
                vector,
                is_latest: true,
                is_approved,
                visibility: Visibility::compute(true, is_approved, false),
                updated_at: now,
            })
            .await?;

        // Final skill patch: only now does `latest` point at the new
        // version.
        skill.display_name = display_name.to_string();
        if let Some(description) = &skill_md.frontmatter.description {
            skill.summary = Some(description.trim().to_string());
        }
        skill.latest_version_id = Some(version_id.clone());
        skill.tags.insert(LATEST_TAG.to_string(), version_id.clone());
        for tag in &request.tags {
            let tag = tag.trim();
            if !tag.is_empty() {
                skill.tags.insert(tag.to_string(), version_id.clone());
            }
        }
        if let Some((fork_of, canonical)) = lineage {
            skill.fork_of = Some(fork_of);
            skill.canonical_skill_id = Some(canonical);
        }
        skill.stats.versions += 1;
        skill.soft_deleted_at = None;
        skill.updated_at = now;
        self.store.put_skill(&skill).await?;

        debug!(
            slug = %skill.slug,
            version = %version,
            source = request.source.as_deref().unwrap_or("api"),
            "published version"
        );

        // Best-effort side effects; failures stay in the logs.
        let hooks = Arc::clone(&self.hooks);
        let hook_skill = skill.clone();
        let hook_version = version_row.clone();
        tokio::spawn(async move {
            if let Err(e) = hooks.after_publish(&hook_skill, &hook_version).await {
                warn!(slug = %hook_skill.slug, error = %e, "post-publish hook failed");
            }
        });

        Ok(PublishOutcome {
            skill_id,
            version_id,
            slug: skill.slug,
            version,
            fingerprint,
            created_skill,
        })
    }

    /// Embedding input: frontmatter headers, then the SKILL.md body, then
    /// each non-markdown text file body, capped at 12,000 characters.
    async fn build_embedding_text(
        &self,
        skill_md: &SkillMd,
        files: &[NewFile],
        skill_md_entry: &NewFile,
    ) -> Result<String> {
        let mut text = String::new();
        if let Some(name) = &skill_md.frontmatter.name {
            text.push_str(name);
            text.push('\n');
        }
        if let Some(description) = &skill_md.frontmatter.description {
            text.push_str(description);
            text.push('\n');
        }
        text.push_str(&skill_md.body);

        for file in files {
            if text.len() >= EMBEDDING_TEXT_LIMIT {
                break;
            }
            if file.path == skill_md_entry.path || is_markdown(&file.path) {
                continue;
            }
            let bytes = self.objects.get(&file.storage_id).await?;
            if sha256_hex(&bytes) != file.sha256 {
                return Err(RegistryError::validation(format!(
                    "declared sha256 of '{}' does not match its stored bytes",
                    file.path
                )));
            }
            text.push('\n');
            text.push_str(&String::from_utf8_lossy(&bytes));
        }

        if text.len() > EMBEDDING_TEXT_LIMIT {
            // Truncate on a char boundary at or below the cap.
            let mut cut = EMBEDDING_TEXT_LIMIT;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        Ok(text)
    }

    /// Lineage of the publish: explicit fork, else a cross-skill
    /// fingerprint duplicate probe. Existing explicit lineage on a
    /// republish is never clobbered by the probe.
    async fn determine_lineage(
        &self,
        request: &PublishRequest,
        existing: Option<&Skill>,
        skill_id: &str,
        fingerprint: &str,
    ) -> Result<Option<(ForkOf, String)>> {
        if let Some(fork_req) = &request.fork_of {
            let upstream = self.require_skill(&fork_req.slug).await?;
            if upstream.id == skill_id {
                return Err(RegistryError::validation("a skill cannot fork itself"));
            }
            let canonical = upstream.canonical_skill_id.clone().unwrap_or(upstream.id.clone());
            return Ok(Some((
                ForkOf {
                    skill_id: upstream.id,
                    kind: ForkKind::Fork,
                    version: fork_req.version.clone(),
                },
                canonical,
            )));
        }

        if existing.is_some_and(|s| s.fork_of.is_some()) {
            return Ok(None);
        }

        let probe = self
            .store
            .find_duplicate_by_fingerprint(fingerprint, Some(skill_id))
            .await?;
        if let Some(row) = probe {
            if let Some(upstream) = self.store.get_skill(&row.skill_id).await? {
                let canonical = upstream.canonical_skill_id.clone().unwrap_or(upstream.id.clone());
                return Ok(Some((
                    ForkOf {
                        skill_id: upstream.id,
                        kind: ForkKind::Duplicate,
                        version: None,
                    },
                    canonical,
                )));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("demo"));
        assert!(is_valid_slug("0day-tools"));
        assert!(is_valid_slug("a"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("Upper"));
        assert!(!is_valid_slug("has_underscore"));
        assert!(!is_valid_slug("has space"));
    }
}
