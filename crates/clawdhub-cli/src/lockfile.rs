//! Per-workdir lockfile and per-install origin markers.
//!
//! The lockfile records which skills are installed under a workdir and at
//! which version; the origin marker inside each installed skill records
//! where it came from.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const STATE_DIR: &str = ".clawdhub";
const LOCKFILE_NAME: &str = "lock.json";
const ORIGIN_NAME: &str = "origin.json";

/// One locked install.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedSkill {
    pub version: String,
    pub installed_at: DateTime<Utc>,
}

/// `<workdir>/.clawdhub/lock.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub skills: BTreeMap<String, LockedSkill>,
}

impl Lockfile {
    pub fn path(workdir: &Path) -> PathBuf {
        workdir.join(STATE_DIR).join(LOCKFILE_NAME)
    }

    pub fn load(workdir: &Path) -> Result<Self> {
        let path = Self::path(workdir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read lockfile: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse lockfile: {}", path.display()))
    }

    pub fn save(&self, workdir: &Path) -> Result<()> {
        let path = Self::path(workdir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize lockfile")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write lockfile: {}", path.display()))
    }

    pub fn record(&mut self, slug: &str, version: &str) {
        self.skills.insert(
            slug.to_string(),
            LockedSkill {
                version: version.to_string(),
                installed_at: Utc::now(),
            },
        );
    }

    pub fn remove(&mut self, slug: &str) -> Option<LockedSkill> {
        self.skills.remove(slug)
    }
}

/// `<skill>/.clawdhub/origin.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginMarker {
    /// Marker format version
    pub version: u32,
    pub registry: String,
    pub slug: String,
    pub installed_version: String,
    pub installed_at: DateTime<Utc>,
}

impl OriginMarker {
    pub fn new(registry: &str, slug: &str, installed_version: &str) -> Self {
        Self {
            version: 1,
            registry: registry.to_string(),
            slug: slug.to_string(),
            installed_version: installed_version.to_string(),
            installed_at: Utc::now(),
        }
    }

    pub fn path(skill_dir: &Path) -> PathBuf {
        skill_dir.join(STATE_DIR).join(ORIGIN_NAME)
    }

    pub fn load(skill_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(skill_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read origin marker: {}", path.display()))?;
        Ok(Some(serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse origin marker: {}", path.display())
        })?))
    }

    pub fn save(&self, skill_dir: &Path) -> Result<()> {
        let path = Self::path(skill_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize origin")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write origin marker: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockfile_round_trip() {
        let tmp = tempfile::tempdir().unwrap();

        let mut lockfile = Lockfile::default();
        lockfile.record("demo", "1.0.0");
        lockfile.record("other", "2.1.0");
        lockfile.save(tmp.path()).unwrap();

        let loaded = Lockfile::load(tmp.path()).unwrap();
        assert_eq!(loaded.skills.len(), 2);
        assert_eq!(loaded.skills["demo"].version, "1.0.0");

        let mut loaded = loaded;
        assert!(loaded.remove("demo").is_some());
        assert!(loaded.remove("demo").is_none());
    }

    #[test]
    fn test_missing_lockfile_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = Lockfile::load(tmp.path()).unwrap();
        assert!(loaded.skills.is_empty());
    }

    #[test]
    fn test_origin_marker_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = OriginMarker::new("https://clawdhub.dev/api/v1", "demo", "1.0.0");
        marker.save(tmp.path()).unwrap();

        let loaded = OriginMarker::load(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.slug, "demo");
        assert_eq!(loaded.installed_version, "1.0.0");

        assert!(OriginMarker::load(&tmp.path().join("nope")).unwrap().is_none());
    }
}
