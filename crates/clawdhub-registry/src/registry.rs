//! The registry service.
//!
//! `Registry` wires the storage and provider seams together and exposes
//! every engine operation: publish, resolve, search, tag/lineage and
//! moderation ops, and the reads behind the HTTP surface. All
//! collaborators are explicit dependencies handed in at construction.

use crate::changelog::ChangelogSummarizer;
use crate::embeddings::EmbeddingProvider;
use crate::errors::{RegistryError, Result};
use crate::fingerprint::sha256_hex;
use crate::objects::ObjectStore;
use crate::store::{MetadataStore, Page, SkillSort};
use crate::types::{
    FileEntry, Skill, SkillBadge, SkillVersion, User, LATEST_TAG, MAX_RAW_FILE_BYTES,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Post-commit side effects of a publish: off-site backup and the publish
/// webhook. Both are fire-and-forget; failures must never roll back the
/// publish.
#[async_trait]
pub trait PublishHooks: Send + Sync {
    async fn after_publish(&self, skill: &Skill, version: &SkillVersion) -> anyhow::Result<()>;
}

/// Default hooks implementation: does nothing.
#[derive(Default)]
pub struct NoopHooks;

#[async_trait]
impl PublishHooks for NoopHooks {
    async fn after_publish(&self, _skill: &Skill, _version: &SkillVersion) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The registry engine.
pub struct Registry {
    pub(crate) store: Arc<dyn MetadataStore>,
    pub(crate) objects: Arc<dyn ObjectStore>,
    pub(crate) embeddings: Arc<dyn EmbeddingProvider>,
    pub(crate) changelog: Arc<dyn ChangelogSummarizer>,
    pub(crate) hooks: Arc<dyn PublishHooks>,
}

/// A skill with the related rows the read endpoints serve.
#[derive(Debug, Clone)]
pub struct SkillView {
    pub skill: Skill,
    pub owner: Option<User>,
    pub latest_version: Option<SkillVersion>,
    pub badges: Vec<SkillBadge>,
}

/// A raw file read: bytes plus the manifest entry they belong to.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub entry: FileEntry,
    pub bytes: Bytes,
    /// True when the file belongs to a non-latest version.
    pub archived: bool,
}

impl Registry {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        changelog: Arc<dyn ChangelogSummarizer>,
        hooks: Arc<dyn PublishHooks>,
    ) -> Self {
        Self { store, objects, embeddings, changelog, hooks }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// Validate a bearer token and return its user.
    ///
    /// The opaque token is hashed and compared against stored token
    /// hashes; the raw string is never persisted.
    pub async fn authenticate(&self, bearer: &str) -> Result<User> {
        let hash = sha256_hex(bearer.as_bytes());
        let token = self
            .store
            .find_token(&hash)
            .await?
            .ok_or(RegistryError::Unauthorized)?;
        let user = self
            .store
            .get_user(&token.user_id)
            .await?
            .filter(|u| u.deleted_at.is_none())
            .ok_or(RegistryError::Unauthorized)?;
        Ok(user)
    }

    /// Load a skill by slug, 404ing on missing or soft-deleted.
    pub(crate) async fn require_skill(&self, slug: &str) -> Result<Skill> {
        let skill = self
            .store
            .get_skill_by_slug(slug)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("skill '{slug}'")))?;
        if skill.is_soft_deleted() {
            return Err(RegistryError::not_found(format!("skill '{slug}'")));
        }
        Ok(skill)
    }

    /// `GET /skills/<slug>`: skill + owner + latest version + badges.
    pub async fn get_skill_view(&self, slug: &str) -> Result<SkillView> {
        let skill = self.require_skill(slug).await?;
        let owner = self.store.get_user(&skill.owner_user_id).await?;
        let latest_version = match &skill.latest_version_id {
            Some(id) => self.store.get_version(id).await?,
            None => None,
        };
        let badges = self.store.badges_for_skill(&skill.id).await?;
        Ok(SkillView { skill, owner, latest_version, badges })
    }

    /// Public listing. Only `sort=updated` honours the cursor.
    pub async fn list_skills(
        &self,
        sort: SkillSort,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Skill>> {
        self.store.list_skills(sort, limit.clamp(1, 200), cursor).await
    }

    /// Versions of a skill, newest first.
    pub async fn list_versions(
        &self,
        slug: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page<SkillVersion>> {
        let skill = self.require_skill(slug).await?;
        self.store.list_versions(&skill.id, limit.clamp(1, 200), cursor).await
    }

    /// A single version by semver string. Soft-deleted versions are gone.
    pub async fn get_version_by_semver(&self, slug: &str, version: &str) -> Result<SkillVersion> {
        let skill = self.require_skill(slug).await?;
        let found = self
            .store
            .find_version(&skill.id, version)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("version '{version}' of '{slug}'")))?;
        if found.soft_deleted_at.is_some() {
            return Err(RegistryError::Gone(format!("version '{version}' of '{slug}'")));
        }
        Ok(found)
    }

    /// Resolve the version a file read targets: explicit semver, a tag
    /// name, or the `latest` tag when neither is given.
    async fn version_for_read(
        &self,
        skill: &Skill,
        version: Option<&str>,
        tag: Option<&str>,
    ) -> Result<SkillVersion> {
        let version_id = if let Some(semver) = version {
            let found = self
                .store
                .find_version(&skill.id, semver)
                .await?
                .ok_or_else(|| {
                    RegistryError::not_found(format!("version '{semver}' of '{}'", skill.slug))
                })?;
            found.id
        } else {
            let tag = tag.unwrap_or(LATEST_TAG);
            skill
                .tags
                .get(tag)
                .cloned()
                .ok_or_else(|| {
                    RegistryError::not_found(format!("tag '{tag}' of '{}'", skill.slug))
                })?
        };

        let found = self
            .store
            .get_version(&version_id)
            .await?
            .ok_or_else(|| RegistryError::not_found("version".to_string()))?;
        if found.soft_deleted_at.is_some() {
            return Err(RegistryError::Gone(format!(
                "version '{}' of '{}'",
                found.version, skill.slug
            )));
        }
        Ok(found)
    }

    /// `GET /skills/<slug>/file`: one raw text file, capped at 200 KB.
    pub async fn read_file(
        &self,
        slug: &str,
        path: &str,
        version: Option<&str>,
        tag: Option<&str>,
    ) -> Result<RawFile> {
        let skill = self.require_skill(slug).await?;
        let resolved = self.version_for_read(&skill, version, tag).await?;

        let entry = resolved
            .files
            .iter()
            .find(|f| f.path == path)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(format!("file '{path}'")))?;

        if entry.size > MAX_RAW_FILE_BYTES {
            return Err(RegistryError::PayloadTooLarge(format!(
                "file '{path}' is {} bytes; raw reads are capped at {MAX_RAW_FILE_BYTES}",
                entry.size
            )));
        }

        let bytes = self.objects.get(&entry.storage_id).await?;
        let archived = skill.latest_version_id.as_deref() != Some(resolved.id.as_str());
        Ok(RawFile { entry, bytes, archived })
    }

    /// Collect a version's files for `GET /download`, newest blob bytes
    /// included, and bump the download counter.
    pub async fn collect_download(
        &self,
        slug: &str,
        version: &str,
    ) -> Result<Vec<(FileEntry, Bytes)>> {
        let skill = self.require_skill(slug).await?;
        let resolved = self.get_version_by_semver(slug, version).await?;

        let mut files = Vec::with_capacity(resolved.files.len());
        for entry in &resolved.files {
            let bytes = self.objects.get(&entry.storage_id).await?;
            files.push((entry.clone(), bytes));
        }

        let mut patched = skill;
        patched.stats.downloads += 1;
        self.store.put_skill(&patched).await?;

        Ok(files)
    }
}
