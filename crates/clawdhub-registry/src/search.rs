//! Hybrid search engine.
//!
//! Vector search recalls semantically related skills; an exact-token
//! post-filter guards precision so a user who typed a concrete slug or
//! word never sees unrelated-but-nearby results. When exact matches are
//! sparse in the head of the candidate list, the candidate window doubles
//! (up to the vector index's cap) before giving up.

use crate::errors::Result;
use crate::registry::Registry;
use crate::store::VECTOR_INDEX_MAX_RESULTS;
use crate::types::{BadgeKind, Skill, SkillBadge, SkillVersion, Visibility};
use tracing::warn;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Search input.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub highlighted_only: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: DEFAULT_SEARCH_LIMIT,
            highlighted_only: false,
        }
    }
}

/// One search result, in vector-index order, carrying its vector score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub skill: Skill,
    pub version: SkillVersion,
    pub owner_handle: Option<String>,
    pub badges: Vec<SkillBadge>,
    pub score: f32,
}

/// Lowercase alphanumeric runs of length >= 2.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Whether every query token appears, whole-word and case-insensitive,
/// in the haystack.
fn matches_all_tokens(tokens: &[String], haystack: &str) -> bool {
    let words: Vec<String> = haystack
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect();
    tokens.iter().all(|t| words.iter().any(|w| w == t))
}

impl Registry {
    /// Run a hybrid search. Best-effort: embedding provider failures
    /// degrade to an empty result list.
    pub async fn search(&self, query: SearchQuery) -> Result<Vec<SearchHit>> {
        let limit = query.limit.clamp(1, MAX_SEARCH_LIMIT);
        let tokens = tokenize(query.query.trim());
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let vector = match self.embeddings.embed_query(query.query.trim()).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed; returning empty results");
                return Ok(Vec::new());
            }
        };

        let mut limit_c = (limit * 3).max(50).clamp(1, VECTOR_INDEX_MAX_RESULTS);
        let max_c = (limit * 10).max(200).clamp(1, VECTOR_INDEX_MAX_RESULTS);

        loop {
            let candidates = self
                .store
                .vector_search(&vector, limit_c, &Visibility::searchable())
                .await?;
            let exhausted = candidates.len() < limit_c;

            let mut matches: Vec<SearchHit> = Vec::new();
            for candidate in &candidates {
                let Some(skill) = self.store.get_skill(&candidate.embedding.skill_id).await? else {
                    continue;
                };
                if skill.is_soft_deleted() {
                    continue;
                }
                let Some(version) = self.store.get_version(&candidate.embedding.version_id).await?
                else {
                    continue;
                };
                let badges = self.store.badges_for_skill(&skill.id).await?;
                if query.highlighted_only
                    && !badges.iter().any(|b| b.kind == BadgeKind::Highlighted)
                {
                    continue;
                }

                let haystack = format!(
                    "{} {} {}",
                    skill.display_name,
                    skill.slug,
                    skill.summary.as_deref().unwrap_or_default()
                );
                if !matches_all_tokens(&tokens, &haystack) {
                    continue;
                }

                let owner_handle = self
                    .store
                    .get_user(&skill.owner_user_id)
                    .await?
                    .and_then(|u| u.handle);
                matches.push(SearchHit {
                    skill,
                    version,
                    owner_handle,
                    badges,
                    score: candidate.score,
                });
                if matches.len() >= limit {
                    break;
                }
            }

            if matches.len() >= limit || exhausted || limit_c >= max_c {
                matches.truncate(limit);
                return Ok(matches);
            }
            limit_c = (limit_c * 2).min(max_c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Google Workspace CLI"), vec!["google", "workspace", "cli"]);
        assert_eq!(tokenize("gif!"), vec!["gif"]);
        assert_eq!(tokenize("a b c"), Vec::<String>::new());
        assert_eq!(tokenize("  "), Vec::<String>::new());
        assert_eq!(tokenize("k8s-ops"), vec!["k8s", "ops"]);
    }

    #[test]
    fn test_whole_word_matching() {
        let tokens = tokenize("gif");
        assert!(matches_all_tokens(&tokens, "Animated GIF encoder"));
        assert!(matches_all_tokens(&tokens, "gif-encoder gif"));
        // "gif" inside "gift" is not a whole-word match
        assert!(!matches_all_tokens(&tokens, "gift wrapping helper"));
        assert!(!matches_all_tokens(&tokens, "Google Workspace CLI"));
    }

    #[test]
    fn test_all_tokens_must_match() {
        let tokens = tokenize("google sheets");
        assert!(matches_all_tokens(&tokens, "google sheets automation"));
        assert!(!matches_all_tokens(&tokens, "google docs automation"));
    }
}
