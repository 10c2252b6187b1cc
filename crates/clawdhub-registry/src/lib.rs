//! ClawdHub registry engine.
//!
//! The server-side core of the skill registry: content model, publish
//! pipeline, fingerprint resolution, hybrid semantic+lexical search, and
//! the tag/lineage/moderation operations, built over two storage seams
//! (a transactional metadata store with a vector index, and an opaque
//! object store) and two provider seams (embeddings and auto-changelog).
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Registry                           │
//! │   publish · resolve · search · tags · moderation · reads  │
//! └───────────────────────────────────────────────────────────┘
//!        │             │              │              │
//!        ▼             ▼              ▼              ▼
//!  MetadataStore   ObjectStore  EmbeddingProvider  ChangelogSummarizer
//!  (documents +    (blob bytes   (text → vector)   (diff → markdown)
//!   vector index)   by id)
//! ```
//!
//! The CLI shares this crate for fingerprinting, frontmatter parsing, and
//! the text-file allow-list, so a locally computed bundle fingerprint is
//! bit-identical to the one the server computes at publish time.

pub mod changelog;
pub mod embeddings;
pub mod errors;
pub mod fingerprint;
pub mod frontmatter;
pub mod moderation;
pub mod objects;
pub mod publish;
pub mod registry;
pub mod resolve;
pub mod search;
pub mod store;
pub mod textfiles;
pub mod types;

pub use changelog::{BasicSummarizer, ChangelogSummarizer};
pub use embeddings::{EmbeddingConfig, EmbeddingProvider, HttpEmbeddingProvider};
pub use errors::{RegistryError, Result};
pub use fingerprint::{bundle_fingerprint, is_hex_digest, sha256_hex};
pub use frontmatter::{parse_skill_md, SkillFrontmatter, SkillMd};
pub use moderation::TagUpdate;
pub use objects::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use publish::{is_valid_slug, ForkOfRequest, NewFile, PublishOutcome, PublishRequest};
pub use registry::{NoopHooks, PublishHooks, RawFile, Registry, SkillView};
pub use resolve::ResolveOutcome;
pub use search::{SearchHit, SearchQuery, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
pub use store::{MemoryStore, MetadataStore, Page, ScoredEmbedding, SkillSort};
pub use types::{
    ApiToken, AuditLog, BadgeKind, ChangelogSource, Comment, FileEntry, ForkKind, ForkOf,
    ModerationStatus, ParsedSkillMd, Role, Skill, SkillBadge, SkillEmbedding, SkillStats,
    SkillVersion, Star, User, VersionFingerprint, Visibility, EMBEDDING_TEXT_LIMIT, LATEST_TAG,
    MAX_BUNDLE_BYTES, MAX_RAW_FILE_BYTES,
};
