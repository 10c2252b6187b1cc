//! Tag movement, lineage, moderation, and ownership operations.
//!
//! Every privileged mutation appends an audit row recording the actor,
//! action, target, and metadata.

use crate::errors::{RegistryError, Result};
use crate::registry::Registry;
use crate::types::{
    new_id, AuditLog, BadgeKind, Comment, ForkKind, ForkOf, SkillBadge, Star, User, LATEST_TAG,
};
use chrono::Utc;

/// One tag assignment: point `tag` at `version_id`.
#[derive(Debug, Clone)]
pub struct TagUpdate {
    pub tag: String,
    pub version_id: String,
}

impl Registry {
    async fn audit(
        &self,
        actor: &User,
        action: &str,
        target_type: &str,
        target_id: &str,
        metadata: serde_json::Value,
    ) -> Result<()> {
        self.store
            .append_audit(&AuditLog {
                id: new_id(),
                actor_user_id: actor.id.clone(),
                action: action.to_string(),
                target_type: target_type.to_string(),
                target_id: target_id.to_string(),
                metadata,
                created_at: Utc::now(),
            })
            .await
    }

    /// Move tags. Owner or moderator only. Moving `latest` also patches
    /// `latest_version_id` and re-anchors the embeddings' latest flag.
    pub async fn update_tags(
        &self,
        actor: &User,
        slug: &str,
        updates: &[TagUpdate],
    ) -> Result<()> {
        let mut skill = self.require_skill(slug).await?;
        if skill.owner_user_id != actor.id && !actor.role.is_moderator() {
            return Err(RegistryError::forbidden("only the owner or a moderator may move tags"));
        }

        let now = Utc::now();
        for update in updates {
            let tag = update.tag.trim();
            if tag.is_empty() {
                return Err(RegistryError::validation("tag name must not be empty"));
            }
            let version = self
                .store
                .get_version(&update.version_id)
                .await?
                .filter(|v| v.skill_id == skill.id)
                .ok_or_else(|| {
                    RegistryError::validation(format!(
                        "version '{}' does not belong to '{slug}'",
                        update.version_id
                    ))
                })?;

            skill.tags.insert(tag.to_string(), version.id.clone());

            if tag == LATEST_TAG {
                skill.latest_version_id = Some(version.id.clone());
                for mut embedding in self.store.embeddings_for_skill(&skill.id).await? {
                    let is_latest = embedding.version_id == version.id;
                    if embedding.is_latest != is_latest {
                        embedding.is_latest = is_latest;
                        embedding.refresh_visibility(skill.is_soft_deleted());
                        embedding.updated_at = now;
                        self.store.put_embedding(&embedding).await?;
                    }
                }
            }
        }
        skill.updated_at = now;
        self.store.put_skill(&skill).await?;

        self.audit(
            actor,
            "skill.tags.update",
            "skill",
            &skill.id,
            serde_json::json!({
                "tags": updates.iter().map(|u| u.tag.clone()).collect::<Vec<_>>()
            }),
        )
        .await
    }

    /// Mark or unmark a skill as a duplicate of a canonical skill.
    /// Moderator only.
    pub async fn set_duplicate(
        &self,
        actor: &User,
        slug: &str,
        canonical_slug: Option<&str>,
    ) -> Result<()> {
        if !actor.role.is_moderator() {
            return Err(RegistryError::forbidden("only moderators may mark duplicates"));
        }
        let mut skill = self.require_skill(slug).await?;

        match canonical_slug {
            None => {
                skill.canonical_skill_id = None;
                skill.fork_of = None;
            }
            Some(canonical_slug) => {
                let canonical = self.require_skill(canonical_slug).await?;
                if canonical.id == skill.id {
                    return Err(RegistryError::validation(
                        "a skill cannot be its own canonical",
                    ));
                }
                let upstream_version = match &canonical.latest_version_id {
                    Some(id) => self.store.get_version(id).await?.map(|v| v.version),
                    None => None,
                };
                skill.canonical_skill_id = Some(canonical.id.clone());
                skill.fork_of = Some(ForkOf {
                    skill_id: canonical.id,
                    kind: ForkKind::Duplicate,
                    version: upstream_version,
                });
            }
        }
        skill.updated_at = Utc::now();
        self.store.put_skill(&skill).await?;

        self.audit(
            actor,
            "skill.duplicate.set",
            "skill",
            &skill.id,
            serde_json::json!({ "canonical": canonical_slug }),
        )
        .await
    }

    /// Transfer ownership. Admin only; re-homes every embedding as well.
    pub async fn change_owner(
        &self,
        actor: &User,
        slug: &str,
        new_owner_user_id: &str,
    ) -> Result<()> {
        if !actor.role.is_admin() {
            return Err(RegistryError::forbidden("only admins may transfer ownership"));
        }
        let mut skill = self.require_skill(slug).await?;
        let new_owner = self
            .store
            .get_user(new_owner_user_id)
            .await?
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| RegistryError::not_found(format!("user '{new_owner_user_id}'")))?;

        let previous = skill.owner_user_id.clone();
        skill.owner_user_id = new_owner.id.clone();
        skill.updated_at = Utc::now();
        self.store.put_skill(&skill).await?;

        for mut embedding in self.store.embeddings_for_skill(&skill.id).await? {
            embedding.owner_id = new_owner.id.clone();
            self.store.put_embedding(&embedding).await?;
        }

        self.audit(
            actor,
            "skill.owner.change",
            "skill",
            &skill.id,
            serde_json::json!({ "from": previous, "to": new_owner.id }),
        )
        .await
    }

    /// Toggle soft deletion. Moderator or owner. Hiding flips every
    /// embedding to `deleted`; restoring recomputes each from its flags.
    pub async fn set_soft_deleted(&self, actor: &User, slug: &str, deleted: bool) -> Result<()> {
        let mut skill = self
            .store
            .get_skill_by_slug(slug)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("skill '{slug}'")))?;
        if skill.owner_user_id != actor.id && !actor.role.is_moderator() {
            return Err(RegistryError::forbidden(
                "only the owner or a moderator may delete a skill",
            ));
        }

        let now = Utc::now();
        skill.soft_deleted_at = if deleted { Some(now) } else { None };
        skill.updated_at = now;
        self.store.put_skill(&skill).await?;

        for mut embedding in self.store.embeddings_for_skill(&skill.id).await? {
            embedding.refresh_visibility(deleted);
            embedding.updated_at = now;
            self.store.put_embedding(&embedding).await?;
        }

        self.audit(
            actor,
            if deleted { "skill.softDelete" } else { "skill.undelete" },
            "skill",
            &skill.id,
            serde_json::json!({ "slug": slug }),
        )
        .await
    }

    /// Permanently delete a skill and everything attached to it. Admin
    /// only. Skills whose lineage pointed at the deleted one have the
    /// reference cleared.
    pub async fn hard_delete(&self, actor: &User, slug: &str) -> Result<()> {
        if !actor.role.is_admin() {
            return Err(RegistryError::forbidden("only admins may hard-delete"));
        }
        let skill = self
            .store
            .get_skill_by_slug(slug)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("skill '{slug}'")))?;

        self.store.delete_versions_for_skill(&skill.id).await?;
        self.store.delete_fingerprints_for_skill(&skill.id).await?;
        self.store.delete_embeddings_for_skill(&skill.id).await?;
        self.store.delete_comments_for_skill(&skill.id).await?;
        self.store.delete_stars_for_skill(&skill.id).await?;
        self.store.delete_badges_for_skill(&skill.id).await?;
        self.store.delete_skill(&skill.id).await?;

        for mut other in self.store.all_skills().await? {
            let mut dirty = false;
            if other.canonical_skill_id.as_deref() == Some(skill.id.as_str()) {
                other.canonical_skill_id = None;
                dirty = true;
            }
            if other
                .fork_of
                .as_ref()
                .is_some_and(|f| f.skill_id == skill.id)
            {
                other.fork_of = None;
                dirty = true;
            }
            if dirty {
                self.store.put_skill(&other).await?;
            }
        }

        self.audit(
            actor,
            "skill.hardDelete",
            "skill",
            &skill.id,
            serde_json::json!({ "slug": slug }),
        )
        .await
    }

    /// Upsert or remove a badge. Highlighted is a moderator power; the
    /// rest are admin-only. Toggling RedactionApproved recomputes every
    /// embedding's approval and visibility.
    pub async fn set_badge(
        &self,
        actor: &User,
        slug: &str,
        kind: BadgeKind,
        on: bool,
    ) -> Result<()> {
        let allowed = match kind {
            BadgeKind::Highlighted => actor.role.is_moderator(),
            BadgeKind::Official | BadgeKind::Deprecated | BadgeKind::RedactionApproved => {
                actor.role.is_admin()
            }
        };
        if !allowed {
            return Err(RegistryError::forbidden("insufficient role for this badge"));
        }

        let skill = self.require_skill(slug).await?;
        let now = Utc::now();
        if on {
            self.store
                .put_badge(&SkillBadge {
                    skill_id: skill.id.clone(),
                    kind,
                    by_user_id: actor.id.clone(),
                    at: now,
                })
                .await?;
        } else {
            self.store.delete_badge(&skill.id, kind).await?;
        }

        if kind == BadgeKind::RedactionApproved {
            for mut embedding in self.store.embeddings_for_skill(&skill.id).await? {
                embedding.is_approved = on;
                embedding.refresh_visibility(skill.is_soft_deleted());
                embedding.updated_at = now;
                self.store.put_embedding(&embedding).await?;
            }
        }

        self.audit(
            actor,
            "skill.badge.set",
            "skill",
            &skill.id,
            serde_json::json!({ "kind": kind, "on": on }),
        )
        .await
    }

    /// Star a skill. Idempotent: starring twice keeps the counter stable.
    pub async fn star(&self, actor: &User, slug: &str) -> Result<u64> {
        let mut skill = self.require_skill(slug).await?;
        let inserted = self
            .store
            .put_star(&Star {
                user_id: actor.id.clone(),
                skill_id: skill.id.clone(),
                created_at: Utc::now(),
            })
            .await?;
        if inserted {
            skill.stats.stars += 1;
            self.store.put_skill(&skill).await?;
        }
        Ok(skill.stats.stars)
    }

    /// Remove a star. Idempotent.
    pub async fn unstar(&self, actor: &User, slug: &str) -> Result<u64> {
        let mut skill = self.require_skill(slug).await?;
        let removed = self.store.delete_star(&actor.id, &skill.id).await?;
        if removed {
            skill.stats.stars = skill.stats.stars.saturating_sub(1);
            self.store.put_skill(&skill).await?;
        }
        Ok(skill.stats.stars)
    }

    /// Append a comment.
    pub async fn add_comment(&self, actor: &User, slug: &str, body: &str) -> Result<Comment> {
        let body = body.trim();
        if body.is_empty() {
            return Err(RegistryError::validation("comment body must not be empty"));
        }
        let mut skill = self.require_skill(slug).await?;
        let comment = Comment {
            id: new_id(),
            skill_id: skill.id.clone(),
            user_id: actor.id.clone(),
            body: body.to_string(),
            created_at: Utc::now(),
            soft_deleted_at: None,
        };
        self.store.put_comment(&comment).await?;
        skill.stats.comments += 1;
        self.store.put_skill(&skill).await?;
        Ok(comment)
    }
}
