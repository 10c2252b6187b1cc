//! Metadata store abstraction.
//!
//! The registry persists its entities in a transactional document store
//! with secondary indexes and a native vector index. The engine consumes
//! this small interface; `MemoryStore` is the in-process implementation
//! used by the default server and by tests.
//!
//! Reads are point-in-time consistent with recently committed writes.
//! Pagination uses opaque cursors that are only meaningful within a single
//! continuation.

mod memory;

pub use memory::MemoryStore;

use crate::errors::Result;
use crate::types::{
    ApiToken, AuditLog, BadgeKind, Comment, Skill, SkillBadge, SkillEmbedding, SkillVersion,
    Star, User, VersionFingerprint, Visibility,
};
use async_trait::async_trait;

/// The vector index admits at most this many results per call.
pub const VECTOR_INDEX_MAX_RESULTS: usize = 256;

/// Sort orders for the public skill listing. Only `Updated` honours a
/// pagination cursor; the others return a single bounded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkillSort {
    #[default]
    Updated,
    Downloads,
    Stars,
    InstallsCurrent,
    InstallsAllTime,
    Trending,
}

impl std::str::FromStr for SkillSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "updated" => Ok(Self::Updated),
            "downloads" => Ok(Self::Downloads),
            "stars" => Ok(Self::Stars),
            "installsCurrent" => Ok(Self::InstallsCurrent),
            "installsAllTime" => Ok(Self::InstallsAllTime),
            "trending" => Ok(Self::Trending),
            other => Err(format!("unknown sort '{other}'")),
        }
    }
}

/// One page of an ordered scan.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn single(items: Vec<T>) -> Self {
        Self { items, next_cursor: None }
    }
}

/// A vector-index hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredEmbedding {
    pub embedding: SkillEmbedding,
    pub score: f32,
}

/// Document get/put/delete, ordered range scans, and vector top-K with a
/// visibility filter. Every mutation executes atomically.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // -- users & tokens --

    async fn get_user(&self, id: &str) -> Result<Option<User>>;
    async fn put_user(&self, user: &User) -> Result<()>;
    /// Look up a non-revoked token by its hash.
    async fn find_token(&self, token_hash: &str) -> Result<Option<ApiToken>>;
    async fn put_token(&self, token: &ApiToken) -> Result<()>;

    // -- skills --

    async fn get_skill(&self, id: &str) -> Result<Option<Skill>>;
    async fn get_skill_by_slug(&self, slug: &str) -> Result<Option<Skill>>;
    async fn put_skill(&self, skill: &Skill) -> Result<()>;
    async fn delete_skill(&self, id: &str) -> Result<()>;
    /// Public listing: excludes soft-deleted and hidden skills. Only
    /// `SkillSort::Updated` pages via the cursor.
    async fn list_skills(
        &self,
        sort: SkillSort,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Skill>>;
    /// Full unordered scan, used for cascade cleanup of lineage references.
    async fn all_skills(&self) -> Result<Vec<Skill>>;

    // -- versions --

    async fn get_version(&self, id: &str) -> Result<Option<SkillVersion>>;
    async fn find_version(&self, skill_id: &str, version: &str) -> Result<Option<SkillVersion>>;
    async fn put_version(&self, version: &SkillVersion) -> Result<()>;
    /// Versions of a skill, newest first.
    async fn list_versions(
        &self,
        skill_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page<SkillVersion>>;
    async fn delete_versions_for_skill(&self, skill_id: &str) -> Result<()>;

    // -- fingerprints --

    async fn put_fingerprint(&self, row: &VersionFingerprint) -> Result<()>;
    /// Fingerprint rows for `(skill, fingerprint)`, newest first, capped.
    async fn fingerprints_for(
        &self,
        skill_id: &str,
        fingerprint: &str,
        limit: usize,
    ) -> Result<Vec<VersionFingerprint>>;
    /// Cross-skill duplicate probe: any row with this fingerprint whose
    /// skill is not soft-deleted and differs from `exclude_skill_id`.
    async fn find_duplicate_by_fingerprint(
        &self,
        fingerprint: &str,
        exclude_skill_id: Option<&str>,
    ) -> Result<Option<VersionFingerprint>>;
    async fn delete_fingerprints_for_skill(&self, skill_id: &str) -> Result<()>;

    // -- embeddings --

    async fn get_embedding(&self, id: &str) -> Result<Option<SkillEmbedding>>;
    async fn put_embedding(&self, row: &SkillEmbedding) -> Result<()>;
    async fn embeddings_for_skill(&self, skill_id: &str) -> Result<Vec<SkillEmbedding>>;
    async fn delete_embeddings_for_skill(&self, skill_id: &str) -> Result<()>;
    /// Cosine top-K over embeddings whose visibility is in `visibilities`.
    /// `limit` is clamped to [`VECTOR_INDEX_MAX_RESULTS`].
    async fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
        visibilities: &[Visibility],
    ) -> Result<Vec<ScoredEmbedding>>;

    // -- stars --

    /// Returns false when the star already existed.
    async fn put_star(&self, star: &Star) -> Result<bool>;
    /// Returns false when there was no star to remove.
    async fn delete_star(&self, user_id: &str, skill_id: &str) -> Result<bool>;
    async fn delete_stars_for_skill(&self, skill_id: &str) -> Result<()>;

    // -- comments --

    async fn put_comment(&self, comment: &Comment) -> Result<()>;
    async fn delete_comments_for_skill(&self, skill_id: &str) -> Result<()>;

    // -- badges --

    async fn put_badge(&self, badge: &SkillBadge) -> Result<()>;
    async fn delete_badge(&self, skill_id: &str, kind: BadgeKind) -> Result<bool>;
    async fn badges_for_skill(&self, skill_id: &str) -> Result<Vec<SkillBadge>>;
    async fn delete_badges_for_skill(&self, skill_id: &str) -> Result<()>;

    // -- audit --

    async fn append_audit(&self, entry: &AuditLog) -> Result<()>;
}
