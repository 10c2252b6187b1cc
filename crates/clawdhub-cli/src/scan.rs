//! Local skill discovery and hashing.
//!
//! Scans configured roots for folders containing a SKILL.md, enumerates
//! their text files, and computes the same per-file digests and bundle
//! fingerprint the server computes at publish time.

use anyhow::{bail, Context, Result};
use clawdhub_registry::{
    bundle_fingerprint, is_valid_slug, parse_skill_md, sha256_hex, textfiles,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One hashed file of a local bundle.
#[derive(Debug, Clone)]
pub struct LocalFile {
    /// Forward-slash path relative to the bundle root
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// A discovered local skill folder, hashed and ready for classification.
#[derive(Debug, Clone)]
pub struct LocalSkill {
    pub slug: String,
    pub dir: PathBuf,
    pub display_name: String,
    pub summary: Option<String>,
    pub files: Vec<LocalFile>,
    pub fingerprint: String,
}

/// Merge user roots, the work directory, and companion-product defaults;
/// canonicalize and dedupe, keeping first-seen order.
pub fn discover_roots(user_roots: &[PathBuf], workdir: &Path) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = user_roots.to_vec();
    candidates.push(workdir.to_path_buf());
    candidates.push(workdir.join("skills"));

    if let Some(home) = dirs::home_dir() {
        // workspace pointer file: a path to the active workspace
        let pointer = home.join(".clawd").join("workspace");
        if let Ok(content) = std::fs::read_to_string(&pointer) {
            let path = content.trim();
            if !path.is_empty() {
                candidates.push(PathBuf::from(path));
            }
        }
        candidates.push(home.join(".clawd").join("skills"));
    }

    if let Ok(extra) = std::env::var("CLAWDHUB_EXTRA_DIRS") {
        for dir in extra.split(':').filter(|d| !d.is_empty()) {
            candidates.push(PathBuf::from(dir));
        }
    }

    let mut seen = HashSet::new();
    let mut roots = Vec::new();
    for candidate in candidates {
        if !candidate.is_dir() {
            continue;
        }
        let resolved = candidate.canonicalize().unwrap_or(candidate);
        if seen.insert(resolved.clone()) {
            roots.push(resolved);
        }
    }
    roots
}

fn has_skill_md(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.flatten().any(|e| {
                e.file_type().map(|t| t.is_file()).unwrap_or(false)
                    && textfiles::is_skill_md(&e.file_name().to_string_lossy())
            })
        })
        .unwrap_or(false)
}

/// Find skill folders in a root: immediate subdirectories containing a
/// SKILL.md (the root itself counts too). Falls back to the legacy
/// `<root>/skills` layout when the direct scan finds nothing.
pub fn scan_root(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if has_skill_md(root) {
        found.push(root.to_path_buf());
    }
    if let Ok(entries) = std::fs::read_dir(root) {
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        dirs.sort();
        for dir in dirs {
            if has_skill_md(&dir) {
                found.push(dir);
            }
        }
    }

    if found.is_empty() {
        let legacy = root.join("skills");
        if legacy.is_dir() && legacy != root {
            return scan_root(&legacy);
        }
    }
    found
}

/// Derive a slug from a folder name: lowercase, runs of other characters
/// collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true; // swallow leading dashes
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Hash one skill folder: enumerate allow-listed text files, digest each,
/// compute the bundle fingerprint, and pull name/summary from the
/// frontmatter.
pub fn load_skill_dir(dir: &Path) -> Result<LocalSkill> {
    let mut files = Vec::new();
    let mut skill_md_rel: Option<String> = None;

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(dir)
            .context("walkdir produced a path outside the root")?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        // internal state directories never ship
        if rel_path.starts_with(".clawdhub/") || rel_path.contains("/.clawdhub/") {
            continue;
        }
        if rel_path.starts_with(".git/") || rel_path.contains("/.git/") {
            continue;
        }
        if !textfiles::is_allowed(&rel_path, None) {
            continue;
        }

        let bytes = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        if textfiles::is_skill_md(&rel_path) && skill_md_rel.is_none() {
            skill_md_rel = Some(rel_path.clone());
        }
        files.push(LocalFile {
            rel_path,
            abs_path: entry.path().to_path_buf(),
            size: bytes.len() as u64,
            sha256: sha256_hex(&bytes),
        });
    }

    let Some(skill_md_rel) = skill_md_rel else {
        bail!("{} does not contain a SKILL.md", dir.display());
    };

    let skill_md_file = files.iter().find(|f| f.rel_path == skill_md_rel).unwrap();
    let content = std::fs::read_to_string(&skill_md_file.abs_path)
        .with_context(|| format!("Failed to read {}", skill_md_file.abs_path.display()))?;
    let skill_md = parse_skill_md(&content)
        .map_err(|e| anyhow::anyhow!("{}: {e}", skill_md_file.abs_path.display()))?;

    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let slug = skill_md
        .frontmatter
        .name
        .as_deref()
        .filter(|n| is_valid_slug(n))
        .map(|n| n.to_string())
        .unwrap_or_else(|| slugify(&dir_name));
    if !is_valid_slug(&slug) {
        bail!(
            "cannot derive a valid slug for {} (got '{slug}')",
            dir.display()
        );
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    let pairs: Vec<(&str, &str)> = files
        .iter()
        .map(|f| (f.rel_path.as_str(), f.sha256.as_str()))
        .collect();
    let fingerprint = bundle_fingerprint(&pairs);

    Ok(LocalSkill {
        display_name: skill_md.frontmatter.name.clone().unwrap_or_else(|| slug.clone()),
        summary: skill_md.frontmatter.description.clone(),
        slug,
        dir: dir.to_path_buf(),
        files,
        fingerprint,
    })
}

/// Keep the first folder per slug; report the rest as skipped.
pub fn dedupe_by_slug(skills: Vec<LocalSkill>) -> (Vec<LocalSkill>, Vec<(String, PathBuf)>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut skipped = Vec::new();
    for skill in skills {
        if seen.insert(skill.slug.clone()) {
            kept.push(skill);
        } else {
            skipped.push((skill.slug.clone(), skill.dir.clone()));
        }
    }
    (kept, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Skill"), "my-skill");
        assert_eq!(slugify("__weird__NAME__"), "weird-name");
        assert_eq!(slugify("already-fine"), "already-fine");
        assert_eq!(slugify("123"), "123");
    }

    #[test]
    fn test_load_skill_dir_hashes_and_fingerprints() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("demo");
        write(&dir, "SKILL.md", "---\nname: demo\ndescription: A demo\n---\nBody");
        write(&dir, "docs/usage.md", "# Usage");
        write(&dir, "logo.png", "not text"); // excluded by the allow-list

        let skill = load_skill_dir(&dir).unwrap();
        assert_eq!(skill.slug, "demo");
        assert_eq!(skill.summary.as_deref(), Some("A demo"));
        assert_eq!(skill.files.len(), 2);

        let expected = bundle_fingerprint(
            &skill
                .files
                .iter()
                .map(|f| (f.rel_path.as_str(), f.sha256.as_str()))
                .collect::<Vec<_>>(),
        );
        assert_eq!(skill.fingerprint, expected);
    }

    #[test]
    fn test_load_skill_dir_slug_falls_back_to_folder_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("My Notes Skill");
        write(&dir, "SKILL.md", "No frontmatter here");

        let skill = load_skill_dir(&dir).unwrap();
        assert_eq!(skill.slug, "my-notes-skill");
    }

    #[test]
    fn test_load_skill_dir_requires_skill_md() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("empty");
        write(&dir, "README.md", "# nothing");
        assert!(load_skill_dir(&dir).is_err());
    }

    #[test]
    fn test_scan_root_finds_subdirs_and_legacy_layout() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a"), "SKILL.md", "---\nname: a\n---\n");
        write(&tmp.path().join("b"), "skills.md", "---\nname: b\n---\n");
        write(&tmp.path().join("c"), "README.md", "no skill here");

        let found = scan_root(tmp.path());
        assert_eq!(found.len(), 2);

        // legacy fallback: nothing at the top, but <root>/skills/* exists
        let tmp2 = tempfile::tempdir().unwrap();
        write(&tmp2.path().join("skills/x"), "SKILL.md", "---\nname: x\n---\n");
        let found = scan_root(tmp2.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("skills/x"));
    }

    #[test]
    fn test_dedupe_by_slug() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("one"), "SKILL.md", "---\nname: demo\n---\n");
        write(&tmp.path().join("two"), "SKILL.md", "---\nname: demo\n---\n");

        let skills = vec![
            load_skill_dir(&tmp.path().join("one")).unwrap(),
            load_skill_dir(&tmp.path().join("two")).unwrap(),
        ];
        let (kept, skipped) = dedupe_by_slug(skills);
        assert_eq!(kept.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "demo");
    }

    #[test]
    fn test_internal_state_dirs_are_not_hashed() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("demo");
        write(&dir, "SKILL.md", "---\nname: demo\n---\n");
        write(&dir, ".clawdhub/origin.json", "{}");

        let skill = load_skill_dir(&dir).unwrap();
        assert_eq!(skill.files.len(), 1);
        assert_eq!(skill.files[0].rel_path, "SKILL.md");
    }
}
