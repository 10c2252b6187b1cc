//! Sync classification and version planning.

use crate::client::RegistryClient;
use crate::scan::LocalSkill;
use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use std::str::FromStr;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 32;

/// How a local folder relates to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The local fingerprint matches a published version.
    Synced { version: String },
    /// The slug exists but the local content matches no published version.
    Update { latest: Option<String> },
    /// The slug is not on the registry yet.
    New,
}

/// One classified plan entry.
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub skill: LocalSkill,
    pub status: SyncStatus,
}

impl PlanItem {
    /// Whether sync would publish this item.
    pub fn is_actionable(&self) -> bool {
        !matches!(self.status, SyncStatus::Synced { .. })
    }
}

/// Classify one local skill against the registry.
pub async fn classify(client: &RegistryClient, skill: &LocalSkill) -> Result<SyncStatus> {
    let Some(_detail) = client.get_skill(&skill.slug).await? else {
        return Ok(SyncStatus::New);
    };

    let resolved = client.resolve(&skill.slug, &skill.fingerprint).await?;
    match resolved.matched {
        Some(m) => Ok(SyncStatus::Synced { version: m.version }),
        None => Ok(SyncStatus::Update {
            latest: resolved.latest_version.map(|v| v.version),
        }),
    }
}

/// Classify every skill with bounded concurrency, preserving input order.
pub async fn classify_all(
    client: &RegistryClient,
    skills: Vec<LocalSkill>,
    concurrency: usize,
) -> Result<Vec<PlanItem>> {
    let concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
    stream::iter(skills)
        .map(|skill| async move {
            let status = classify(client, &skill)
                .await
                .with_context(|| format!("Failed to classify '{}'", skill.slug))?;
            Ok(PlanItem { skill, status })
        })
        .buffered(concurrency)
        .collect::<Vec<Result<PlanItem>>>()
        .await
        .into_iter()
        .collect()
}

/// Version bump level for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bump {
    #[default]
    Patch,
    Minor,
    Major,
}

impl FromStr for Bump {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => bail!("unknown bump level '{other}' (expected patch, minor, or major)"),
        }
    }
}

/// Compute the next version for an update.
pub fn next_version(latest: &str, bump: Bump) -> Result<String> {
    let mut version = semver::Version::parse(latest)
        .with_context(|| format!("registry returned a non-semver version '{latest}'"))?;
    version.pre = semver::Prerelease::EMPTY;
    version.build = semver::BuildMetadata::EMPTY;
    match bump {
        Bump::Patch => version.patch += 1,
        Bump::Minor => {
            version.minor += 1;
            version.patch = 0;
        }
        Bump::Major => {
            version.major += 1;
            version.minor = 0;
            version.patch = 0;
        }
    }
    Ok(version.to_string())
}

/// First version of a brand-new skill.
pub fn initial_version() -> String {
    "1.0.0".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_parsing() {
        assert_eq!("patch".parse::<Bump>().unwrap(), Bump::Patch);
        assert_eq!("MINOR".parse::<Bump>().unwrap(), Bump::Minor);
        assert_eq!("major".parse::<Bump>().unwrap(), Bump::Major);
        assert!("huge".parse::<Bump>().is_err());
    }

    #[test]
    fn test_next_version() {
        assert_eq!(next_version("1.2.3", Bump::Patch).unwrap(), "1.2.4");
        assert_eq!(next_version("1.2.3", Bump::Minor).unwrap(), "1.3.0");
        assert_eq!(next_version("1.2.3", Bump::Major).unwrap(), "2.0.0");
        // prerelease tags are shed on bump
        assert_eq!(next_version("1.2.3-beta.1", Bump::Patch).unwrap(), "1.2.4");
        assert!(next_version("one.two", Bump::Patch).is_err());
    }

    #[test]
    fn test_actionable() {
        let skill = crate::scan::LocalSkill {
            slug: "demo".to_string(),
            dir: std::path::PathBuf::from("."),
            display_name: "demo".to_string(),
            summary: None,
            files: Vec::new(),
            fingerprint: String::new(),
        };
        let synced = PlanItem {
            skill: skill.clone(),
            status: SyncStatus::Synced { version: "1.0.0".to_string() },
        };
        let new = PlanItem { skill, status: SyncStatus::New };
        assert!(!synced.is_actionable());
        assert!(new.is_actionable());
    }
}
