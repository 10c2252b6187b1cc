//! In-memory metadata store.
//!
//! Backs the default server and the test suites. A single `RwLock` over
//! the table set gives every mutation the single-writer atomicity the
//! trait promises; reads see a point-in-time snapshot.

use super::{MetadataStore, Page, ScoredEmbedding, SkillSort, VECTOR_INDEX_MAX_RESULTS};
use crate::errors::Result;
use crate::types::{
    ApiToken, AuditLog, BadgeKind, Comment, Skill, SkillBadge, SkillEmbedding, SkillVersion,
    Star, User, VersionFingerprint, Visibility,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct StoreInner {
    users: HashMap<String, User>,
    tokens_by_hash: HashMap<String, ApiToken>,
    skills: HashMap<String, Skill>,
    slug_index: HashMap<String, String>,
    versions: HashMap<String, SkillVersion>,
    fingerprints: Vec<VersionFingerprint>,
    embeddings: HashMap<String, SkillEmbedding>,
    stars: HashMap<(String, String), Star>,
    comments: HashMap<String, Comment>,
    badges: HashMap<(String, BadgeKind), SkillBadge>,
    audit: Vec<AuditLog>,
}

/// In-memory [`MetadataStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit entries recorded so far (test helper).
    pub async fn audit_len(&self) -> usize {
        self.inner.read().await.audit.len()
    }
}

/// Cursor = "{millis}:{id}" of the last item already returned.
fn encode_cursor(at: DateTime<Utc>, id: &str) -> String {
    format!("{}:{}", at.timestamp_millis(), id)
}

fn decode_cursor(cursor: &str) -> Option<(i64, String)> {
    let (millis, id) = cursor.split_once(':')?;
    Some((millis.parse().ok()?, id.to_string()))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Page over items already sorted newest-first on `(at, id)`.
fn paginate<T: Clone>(
    sorted: &[(DateTime<Utc>, String, T)],
    limit: usize,
    cursor: Option<&str>,
) -> Page<T> {
    let start = match cursor.and_then(decode_cursor) {
        Some((millis, id)) => sorted
            .iter()
            .position(|(at, item_id, _)| at.timestamp_millis() == millis && *item_id == id)
            .map(|pos| pos + 1)
            .unwrap_or(0),
        None => 0,
    };

    let items: Vec<T> = sorted.iter().skip(start).take(limit).map(|(_, _, v)| v.clone()).collect();
    let next_cursor = if !items.is_empty() && start + items.len() < sorted.len() {
        sorted
            .get(start + items.len() - 1)
            .map(|(at, id, _)| encode_cursor(*at, id))
    } else {
        None
    };

    Page { items, next_cursor }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        self.inner.write().await.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<ApiToken>> {
        Ok(self
            .inner
            .read()
            .await
            .tokens_by_hash
            .get(token_hash)
            .filter(|t| t.revoked_at.is_none())
            .cloned())
    }

    async fn put_token(&self, token: &ApiToken) -> Result<()> {
        self.inner
            .write()
            .await
            .tokens_by_hash
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn get_skill(&self, id: &str) -> Result<Option<Skill>> {
        Ok(self.inner.read().await.skills.get(id).cloned())
    }

    async fn get_skill_by_slug(&self, slug: &str) -> Result<Option<Skill>> {
        let inner = self.inner.read().await;
        Ok(inner
            .slug_index
            .get(slug)
            .and_then(|id| inner.skills.get(id))
            .cloned())
    }

    async fn put_skill(&self, skill: &Skill) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.slug_index.insert(skill.slug.clone(), skill.id.clone());
        inner.skills.insert(skill.id.clone(), skill.clone());
        Ok(())
    }

    async fn delete_skill(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(skill) = inner.skills.remove(id) {
            inner.slug_index.remove(&skill.slug);
        }
        Ok(())
    }

    async fn list_skills(
        &self,
        sort: SkillSort,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Skill>> {
        let inner = self.inner.read().await;
        let visible = inner
            .skills
            .values()
            .filter(|s| !s.is_soft_deleted())
            .filter(|s| s.moderation_status == crate::types::ModerationStatus::Active);

        if sort == SkillSort::Updated {
            let mut sorted: Vec<(DateTime<Utc>, String, Skill)> = visible
                .map(|s| (s.updated_at, s.id.clone(), s.clone()))
                .collect();
            sorted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
            return Ok(paginate(&sorted, limit, cursor));
        }

        // Non-updated sorts return a single bounded page, no cursor.
        let mut items: Vec<Skill> = visible.cloned().collect();
        match sort {
            SkillSort::Downloads => items.sort_by(|a, b| b.stats.downloads.cmp(&a.stats.downloads)),
            SkillSort::Stars => items.sort_by(|a, b| b.stats.stars.cmp(&a.stats.stars)),
            SkillSort::InstallsCurrent => {
                items.sort_by(|a, b| b.stats.installs_current.cmp(&a.stats.installs_current))
            }
            SkillSort::InstallsAllTime => {
                items.sort_by(|a, b| b.stats.installs_all_time.cmp(&a.stats.installs_all_time))
            }
            SkillSort::Trending => items.sort_by(|a, b| {
                let score = |s: &Skill| {
                    s.stats.downloads + 3 * s.stats.stars + 5 * s.stats.installs_current
                };
                score(b).cmp(&score(a)).then_with(|| b.updated_at.cmp(&a.updated_at))
            }),
            SkillSort::Updated => unreachable!(),
        }
        items.truncate(limit);
        Ok(Page::single(items))
    }

    async fn all_skills(&self) -> Result<Vec<Skill>> {
        Ok(self.inner.read().await.skills.values().cloned().collect())
    }

    async fn get_version(&self, id: &str) -> Result<Option<SkillVersion>> {
        Ok(self.inner.read().await.versions.get(id).cloned())
    }

    async fn find_version(&self, skill_id: &str, version: &str) -> Result<Option<SkillVersion>> {
        Ok(self
            .inner
            .read()
            .await
            .versions
            .values()
            .find(|v| v.skill_id == skill_id && v.version == version)
            .cloned())
    }

    async fn put_version(&self, version: &SkillVersion) -> Result<()> {
        self.inner
            .write()
            .await
            .versions
            .insert(version.id.clone(), version.clone());
        Ok(())
    }

    async fn list_versions(
        &self,
        skill_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page<SkillVersion>> {
        let inner = self.inner.read().await;
        let mut sorted: Vec<(DateTime<Utc>, String, SkillVersion)> = inner
            .versions
            .values()
            .filter(|v| v.skill_id == skill_id)
            .map(|v| (v.created_at, v.id.clone(), v.clone()))
            .collect();
        sorted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(paginate(&sorted, limit, cursor))
    }

    async fn delete_versions_for_skill(&self, skill_id: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .versions
            .retain(|_, v| v.skill_id != skill_id);
        Ok(())
    }

    async fn put_fingerprint(&self, row: &VersionFingerprint) -> Result<()> {
        self.inner.write().await.fingerprints.push(row.clone());
        Ok(())
    }

    async fn fingerprints_for(
        &self,
        skill_id: &str,
        fingerprint: &str,
        limit: usize,
    ) -> Result<Vec<VersionFingerprint>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<VersionFingerprint> = inner
            .fingerprints
            .iter()
            .filter(|f| f.skill_id == skill_id && f.fingerprint == fingerprint)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn find_duplicate_by_fingerprint(
        &self,
        fingerprint: &str,
        exclude_skill_id: Option<&str>,
    ) -> Result<Option<VersionFingerprint>> {
        let inner = self.inner.read().await;
        Ok(inner
            .fingerprints
            .iter()
            .filter(|f| f.fingerprint == fingerprint)
            .filter(|f| Some(f.skill_id.as_str()) != exclude_skill_id)
            .find(|f| {
                inner
                    .skills
                    .get(&f.skill_id)
                    .is_some_and(|s| !s.is_soft_deleted())
            })
            .cloned())
    }

    async fn delete_fingerprints_for_skill(&self, skill_id: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .fingerprints
            .retain(|f| f.skill_id != skill_id);
        Ok(())
    }

    async fn get_embedding(&self, id: &str) -> Result<Option<SkillEmbedding>> {
        Ok(self.inner.read().await.embeddings.get(id).cloned())
    }

    async fn put_embedding(&self, row: &SkillEmbedding) -> Result<()> {
        self.inner
            .write()
            .await
            .embeddings
            .insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn embeddings_for_skill(&self, skill_id: &str) -> Result<Vec<SkillEmbedding>> {
        Ok(self
            .inner
            .read()
            .await
            .embeddings
            .values()
            .filter(|e| e.skill_id == skill_id)
            .cloned()
            .collect())
    }

    async fn delete_embeddings_for_skill(&self, skill_id: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .embeddings
            .retain(|_, e| e.skill_id != skill_id);
        Ok(())
    }

    async fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
        visibilities: &[Visibility],
    ) -> Result<Vec<ScoredEmbedding>> {
        let limit = limit.min(VECTOR_INDEX_MAX_RESULTS);
        let inner = self.inner.read().await;
        let mut scored: Vec<ScoredEmbedding> = inner
            .embeddings
            .values()
            .filter(|e| visibilities.contains(&e.visibility))
            .filter(|e| e.vector.len() == vector.len())
            .map(|e| ScoredEmbedding {
                score: cosine_similarity(vector, &e.vector),
                embedding: e.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn put_star(&self, star: &Star) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let key = (star.user_id.clone(), star.skill_id.clone());
        if inner.stars.contains_key(&key) {
            return Ok(false);
        }
        inner.stars.insert(key, star.clone());
        Ok(true)
    }

    async fn delete_star(&self, user_id: &str, skill_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .stars
            .remove(&(user_id.to_string(), skill_id.to_string()))
            .is_some())
    }

    async fn delete_stars_for_skill(&self, skill_id: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .stars
            .retain(|(_, sid), _| sid != skill_id);
        Ok(())
    }

    async fn put_comment(&self, comment: &Comment) -> Result<()> {
        self.inner
            .write()
            .await
            .comments
            .insert(comment.id.clone(), comment.clone());
        Ok(())
    }

    async fn delete_comments_for_skill(&self, skill_id: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .comments
            .retain(|_, c| c.skill_id != skill_id);
        Ok(())
    }

    async fn put_badge(&self, badge: &SkillBadge) -> Result<()> {
        self.inner
            .write()
            .await
            .badges
            .insert((badge.skill_id.clone(), badge.kind), badge.clone());
        Ok(())
    }

    async fn delete_badge(&self, skill_id: &str, kind: BadgeKind) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.badges.remove(&(skill_id.to_string(), kind)).is_some())
    }

    async fn badges_for_skill(&self, skill_id: &str) -> Result<Vec<SkillBadge>> {
        Ok(self
            .inner
            .read()
            .await
            .badges
            .values()
            .filter(|b| b.skill_id == skill_id)
            .cloned()
            .collect())
    }

    async fn delete_badges_for_skill(&self, skill_id: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .badges
            .retain(|(sid, _), _| sid != skill_id);
        Ok(())
    }

    async fn append_audit(&self, entry: &AuditLog) -> Result<()> {
        self.inner.write().await.audit.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{new_id, ModerationStatus, SkillStats};
    use std::collections::BTreeMap;

    fn skill(slug: &str) -> Skill {
        Skill {
            id: new_id(),
            slug: slug.to_string(),
            display_name: slug.to_string(),
            summary: None,
            owner_user_id: "u1".to_string(),
            latest_version_id: None,
            tags: BTreeMap::new(),
            canonical_skill_id: None,
            fork_of: None,
            moderation_status: ModerationStatus::Active,
            soft_deleted_at: None,
            report_count: 0,
            stats: SkillStats::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_slug_lookup() {
        let store = MemoryStore::new();
        let s = skill("demo");
        store.put_skill(&s).await.unwrap();
        let found = store.get_skill_by_slug("demo").await.unwrap().unwrap();
        assert_eq!(found.id, s.id);
        assert!(store.get_skill_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_skills_pagination() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let mut s = skill(&format!("skill-{i}"));
            s.updated_at = Utc::now() + chrono::Duration::seconds(i);
            store.put_skill(&s).await.unwrap();
        }

        let page1 = store.list_skills(SkillSort::Updated, 2, None).await.unwrap();
        assert_eq!(page1.items.len(), 2);
        assert!(page1.next_cursor.is_some());

        let page2 = store
            .list_skills(SkillSort::Updated, 2, page1.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(page2.items.len(), 2);
        let slugs1: Vec<_> = page1.items.iter().map(|s| s.slug.clone()).collect();
        let slugs2: Vec<_> = page2.items.iter().map(|s| s.slug.clone()).collect();
        assert!(slugs1.iter().all(|s| !slugs2.contains(s)));
    }

    #[tokio::test]
    async fn test_list_skills_hides_soft_deleted() {
        let store = MemoryStore::new();
        let mut s = skill("gone");
        s.soft_deleted_at = Some(Utc::now());
        store.put_skill(&s).await.unwrap();
        store.put_skill(&skill("visible")).await.unwrap();

        let page = store.list_skills(SkillSort::Updated, 10, None).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].slug, "visible");
    }

    #[tokio::test]
    async fn test_vector_search_filters_and_ranks() {
        let store = MemoryStore::new();
        let mk = |id: &str, vector: Vec<f32>, visibility: Visibility| SkillEmbedding {
            id: id.to_string(),
            skill_id: id.to_string(),
            version_id: new_id(),
            owner_id: "u1".to_string(),
            vector,
            is_latest: true,
            is_approved: false,
            visibility,
            updated_at: Utc::now(),
        };
        store.put_embedding(&mk("a", vec![1.0, 0.0], Visibility::Latest)).await.unwrap();
        store.put_embedding(&mk("b", vec![0.7, 0.7], Visibility::Latest)).await.unwrap();
        store.put_embedding(&mk("c", vec![1.0, 0.0], Visibility::Deleted)).await.unwrap();

        let hits = store
            .vector_search(&[1.0, 0.0], 10, &Visibility::searchable())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].embedding.id, "a");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_star_idempotence() {
        let store = MemoryStore::new();
        let star = Star {
            user_id: "u1".to_string(),
            skill_id: "s1".to_string(),
            created_at: Utc::now(),
        };
        assert!(store.put_star(&star).await.unwrap());
        assert!(!store.put_star(&star).await.unwrap());
        assert!(store.delete_star("u1", "s1").await.unwrap());
        assert!(!store.delete_star("u1", "s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoked_token_is_invisible() {
        let store = MemoryStore::new();
        let mut token = ApiToken {
            id: new_id(),
            token_hash: "abc".to_string(),
            user_id: "u1".to_string(),
            label: "cli".to_string(),
            created_at: Utc::now(),
            revoked_at: None,
        };
        store.put_token(&token).await.unwrap();
        assert!(store.find_token("abc").await.unwrap().is_some());

        token.revoked_at = Some(Utc::now());
        store.put_token(&token).await.unwrap();
        assert!(store.find_token("abc").await.unwrap().is_none());
    }
}
