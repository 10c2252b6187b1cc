//! API types for request and response payloads.
//!
//! Wire names are camelCase; every schema is exported to the OpenAPI
//! document.

use chrono::{DateTime, Utc};
use clawdhub_registry::{
    BadgeKind, ChangelogSource, FileEntry, ForkKind, Skill, SkillBadge, SkillVersion, User,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Standard error body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{} not found", resource))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&User> for OwnerDto {
    fn from(user: &User) -> Self {
        Self {
            handle: user.handle.clone(),
            display_name: user.display_name.clone(),
            image: user.image.clone(),
        }
    }
}

/// Stat counters of a skill
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillStatsDto {
    pub downloads: u64,
    pub stars: u64,
    pub versions: u64,
    pub comments: u64,
    pub installs_current: u64,
    pub installs_all_time: u64,
}

/// Lineage reference
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForkOfDto {
    pub skill_id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Public view of a skill
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillDto {
    pub id: String,
    pub slug: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_skill_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork_of: Option<ForkOfDto>,
    pub stats: SkillStatsDto,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn badge_name(kind: BadgeKind) -> &'static str {
    match kind {
        BadgeKind::Highlighted => "highlighted",
        BadgeKind::Official => "official",
        BadgeKind::Deprecated => "deprecated",
        BadgeKind::RedactionApproved => "redactionApproved",
    }
}

impl SkillDto {
    pub fn from_skill(skill: &Skill, badges: &[SkillBadge]) -> Self {
        Self {
            id: skill.id.clone(),
            slug: skill.slug.clone(),
            display_name: skill.display_name.clone(),
            summary: skill.summary.clone(),
            tags: skill.tags.clone(),
            canonical_skill_id: skill.canonical_skill_id.clone(),
            fork_of: skill.fork_of.as_ref().map(|f| ForkOfDto {
                skill_id: f.skill_id.clone(),
                kind: match f.kind {
                    ForkKind::Fork => "fork".to_string(),
                    ForkKind::Duplicate => "duplicate".to_string(),
                },
                version: f.version.clone(),
            }),
            stats: SkillStatsDto {
                downloads: skill.stats.downloads,
                stars: skill.stats.stars,
                versions: skill.stats.versions,
                comments: skill.stats.comments,
                installs_current: skill.stats.installs_current,
                installs_all_time: skill.stats.installs_all_time,
            },
            badges: badges.iter().map(|b| badge_name(b.kind).to_string()).collect(),
            created_at: skill.created_at,
            updated_at: skill.updated_at,
        }
    }
}

/// One file of a version manifest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub path: String,
    pub size: u64,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl From<&FileEntry> for FileDto {
    fn from(entry: &FileEntry) -> Self {
        Self {
            path: entry.path.clone(),
            size: entry.size,
            sha256: entry.sha256.clone(),
            content_type: entry.content_type.clone(),
        }
    }
}

/// A published version, without the file manifest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummaryDto {
    pub version: String,
    pub changelog: String,
    pub changelog_source: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl From<&SkillVersion> for VersionSummaryDto {
    fn from(v: &SkillVersion) -> Self {
        Self {
            version: v.version.clone(),
            changelog: v.changelog.clone(),
            changelog_source: match v.changelog_source {
                ChangelogSource::Auto => "auto".to_string(),
                ChangelogSource::User => "user".to_string(),
            },
            fingerprint: v.fingerprint.clone(),
            created_at: v.created_at,
        }
    }
}

/// A published version with its file manifest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetailDto {
    #[serde(flatten)]
    pub summary: VersionSummaryDto,
    pub files: Vec<FileDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontmatter: Option<serde_json::Value>,
}

impl From<&SkillVersion> for VersionDetailDto {
    fn from(v: &SkillVersion) -> Self {
        Self {
            summary: VersionSummaryDto::from(v),
            files: v.files.iter().map(FileDto::from).collect(),
            frontmatter: Some(v.parsed.frontmatter.clone()),
        }
    }
}

/// `GET /skills/<slug>` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillDetailResponse {
    pub skill: SkillDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<VersionSummaryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerDto>,
}

/// `GET /skills` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillListResponse {
    pub skills: Vec<SkillDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `GET /skills/<slug>/versions` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionListResponse {
    pub versions: Vec<VersionSummaryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Query parameters of `GET /search`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub highlighted_only: Option<bool>,
}

/// One search result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultDto {
    pub score: f32,
    pub slug: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_handle: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// `GET /search` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchResultDto>,
}

/// Resolver output: the matched version (if any) and the current latest.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    #[serde(rename = "match")]
    pub matched: Option<ResolvedVersion>,
    pub latest_version: Option<ResolvedVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolvedVersion {
    pub version: String,
}

/// Query parameters of `GET /skill/resolve`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResolveParams {
    pub slug: String,
    pub hash: String,
}

/// `GET /whoami` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WhoamiResponse {
    pub user: OwnerDto,
}

/// Query parameters of `GET /skills`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

/// Query parameters of `GET /skills/<slug>/file`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FileParams {
    pub path: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Query parameters of `GET /download`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DownloadParams {
    pub slug: String,
    pub version: String,
}

/// Lineage reference in a publish payload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishForkOf {
    pub slug: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// One file reference in a JSON publish (blob uploaded beforehand)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishFileRef {
    pub path: String,
    pub size: u64,
    pub storage_id: String,
    pub sha256: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Publish payload: the JSON body, or the `payload` field of a multipart
/// publish (in which case `files` is empty and the parts carry the bytes).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishPayload {
    pub slug: String,
    pub display_name: String,
    pub version: String,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub fork_of: Option<PublishForkOf>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<PublishFileRef>>,
}

/// `POST /skills` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub skill_id: String,
    pub version_id: String,
    pub slug: String,
    pub version: String,
    pub fingerprint: String,
    pub created: bool,
}

/// Star toggle response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StarResponse {
    pub stars: u64,
}

/// Soft delete / undelete response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}
