//! Entity model for the registry.
//!
//! Every entity is a plain serde struct with string ids (uuid v4) and UTC
//! timestamps. Relationships are expressed as id references rather than
//! in-memory pointers; lineage readers walk one step and stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The distinguished tag that always tracks `latest_version_id`.
pub const LATEST_TAG: &str = "latest";

/// Maximum total bundle size accepted at publish time (50 MB).
pub const MAX_BUNDLE_BYTES: u64 = 50 * 1024 * 1024;

/// Maximum raw-file read size served by the HTTP facade (200 KB).
pub const MAX_RAW_FILE_BYTES: u64 = 200 * 1024;

/// Character cap for the text handed to the embedding provider.
pub const EMBEDDING_TEXT_LIMIT: usize = 12_000;

/// Principal role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

impl Role {
    /// Moderators and admins can moderate; admins alone hold destructive powers.
    pub fn is_moderator(&self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// A registry user. Created on first login (the login flow itself is an
/// external collaborator; the engine only sees the stable id and role).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Optional unique handle
    pub handle: Option<String>,
    pub display_name: String,
    pub image: Option<String>,
    pub role: Role,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// An API token. The opaque string is never stored; only its SHA-256 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: String,
    pub token_hash: String,
    pub user_id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Moderation state of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    #[default]
    Active,
    Hidden,
}

/// Lineage kind: explicit fork vs. fingerprint-detected duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkKind {
    Fork,
    Duplicate,
}

/// Upstream reference recorded on forked or duplicated skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkOf {
    pub skill_id: String,
    pub kind: ForkKind,
    pub version: Option<String>,
}

/// Per-skill stat counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillStats {
    pub downloads: u64,
    pub stars: u64,
    pub versions: u64,
    pub comments: u64,
    pub installs_current: u64,
    pub installs_all_time: u64,
}

/// A named, versioned bundle of text files describing an agent capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    /// Globally unique lowercase url-safe identifier.
    pub slug: String,
    pub display_name: String,
    pub summary: Option<String>,
    pub owner_user_id: String,
    /// Unset only transiently while the first publish is in flight.
    pub latest_version_id: Option<String>,
    /// Tag name -> version id; always includes `latest` once published.
    pub tags: BTreeMap<String, String>,
    /// Points at the canonical skill when this one is a fork or duplicate.
    pub canonical_skill_id: Option<String>,
    pub fork_of: Option<ForkOf>,
    pub moderation_status: ModerationStatus,
    pub soft_deleted_at: Option<DateTime<Utc>>,
    pub report_count: u64,
    pub stats: SkillStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skill {
    pub fn is_soft_deleted(&self) -> bool {
        self.soft_deleted_at.is_some()
    }
}

/// One file within a published version. `sha256` is the digest of the
/// stored bytes; `storage_id` addresses the blob in the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
    pub storage_id: String,
    pub content_type: Option<String>,
}

/// Provenance of a version's changelog text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogSource {
    Auto,
    User,
}

/// Parsed SKILL.md projection stored alongside a version: the raw
/// frontmatter mapping plus the optional free-form metadata record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSkillMd {
    pub frontmatter: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
}

/// An immutable published version. Files and the version string never
/// change after commit; only `soft_deleted_at` toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillVersion {
    pub id: String,
    pub skill_id: String,
    pub version: String,
    pub changelog: String,
    pub changelog_source: ChangelogSource,
    pub files: Vec<FileEntry>,
    /// SHA-256 over the sorted `path:sha256` lines of `files`.
    pub fingerprint: String,
    pub parsed: ParsedSkillMd,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub soft_deleted_at: Option<DateTime<Utc>>,
}

/// Fingerprint index row: one per version, also used for cross-skill
/// duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionFingerprint {
    pub skill_id: String,
    pub version_id: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

/// Search visibility attached to an embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Latest,
    LatestApproved,
    Archived,
    ArchivedApproved,
    Deleted,
}

impl Visibility {
    /// The visibility state machine. Soft deletion of the skill overrides
    /// everything; otherwise visibility is a pure function of
    /// `(is_latest, is_approved)`.
    pub fn compute(is_latest: bool, is_approved: bool, skill_soft_deleted: bool) -> Self {
        if skill_soft_deleted {
            return Visibility::Deleted;
        }
        match (is_latest, is_approved) {
            (true, true) => Visibility::LatestApproved,
            (true, false) => Visibility::Latest,
            (false, true) => Visibility::ArchivedApproved,
            (false, false) => Visibility::Archived,
        }
    }

    /// Visibilities admitted by search candidate retrieval.
    pub fn searchable() -> [Visibility; 2] {
        [Visibility::Latest, Visibility::LatestApproved]
    }
}

/// A fixed-dimension vector derived from a version's text content,
/// tracking whether it belongs to the current version and whether its
/// redaction has been reviewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEmbedding {
    pub id: String,
    pub skill_id: String,
    pub version_id: String,
    pub owner_id: String,
    pub vector: Vec<f32>,
    pub is_latest: bool,
    pub is_approved: bool,
    pub visibility: Visibility,
    pub updated_at: DateTime<Utc>,
}

impl SkillEmbedding {
    /// Recompute and store `visibility` from the current flags.
    pub fn refresh_visibility(&mut self, skill_soft_deleted: bool) {
        self.visibility = Visibility::compute(self.is_latest, self.is_approved, skill_soft_deleted);
    }
}

/// A user's star on a skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Star {
    pub user_id: String,
    pub skill_id: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only comment with soft delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub skill_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub soft_deleted_at: Option<DateTime<Utc>>,
}

/// Badge kinds assignable by moderators/admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeKind {
    Highlighted,
    Official,
    Deprecated,
    RedactionApproved,
}

/// A (skill, kind) badge row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillBadge {
    pub skill_id: String,
    pub kind: BadgeKind,
    pub by_user_id: String,
    pub at: DateTime<Utc>,
}

/// Append-only record of a privileged mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub actor_user_id: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Generate a fresh entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_table() {
        assert_eq!(Visibility::compute(true, true, false), Visibility::LatestApproved);
        assert_eq!(Visibility::compute(true, false, false), Visibility::Latest);
        assert_eq!(Visibility::compute(false, true, false), Visibility::ArchivedApproved);
        assert_eq!(Visibility::compute(false, false, false), Visibility::Archived);
    }

    #[test]
    fn test_visibility_soft_delete_overrides() {
        for is_latest in [true, false] {
            for is_approved in [true, false] {
                assert_eq!(
                    Visibility::compute(is_latest, is_approved, true),
                    Visibility::Deleted
                );
            }
        }
    }

    #[test]
    fn test_role_powers() {
        assert!(Role::Admin.is_moderator());
        assert!(Role::Admin.is_admin());
        assert!(Role::Moderator.is_moderator());
        assert!(!Role::Moderator.is_admin());
        assert!(!Role::User.is_moderator());
    }
}
