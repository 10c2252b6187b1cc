//! SKILL.md frontmatter parsing.
//!
//! A SKILL.md starts with an optional `---`-fenced YAML block. Recognized
//! keys are `name`, `description` (multiline allowed), and a free-form
//! nested `metadata` record. The raw mapping is kept as JSON next to the
//! typed projection so unknown keys survive a round trip.

use crate::errors::{RegistryError, Result};
use crate::types::ParsedSkillMd;
use serde::Deserialize;

/// Typed projection of the recognized frontmatter keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillFrontmatter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A parsed SKILL.md: typed keys, raw mapping, and the markdown body.
#[derive(Debug, Clone, Default)]
pub struct SkillMd {
    pub frontmatter: SkillFrontmatter,
    pub raw: serde_json::Value,
    pub body: String,
}

impl SkillMd {
    /// Storage projection kept on the version row.
    pub fn parsed(&self) -> ParsedSkillMd {
        ParsedSkillMd {
            frontmatter: self.raw.clone(),
            metadata: self.frontmatter.metadata.clone(),
        }
    }
}

/// Parse SKILL.md content. Files without a frontmatter fence yield an
/// empty mapping and the whole content as body.
pub fn parse_skill_md(content: &str) -> Result<SkillMd> {
    let content = content.trim_start_matches('\u{feff}');

    if !content.starts_with("---") {
        return Ok(SkillMd {
            body: content.trim().to_string(),
            raw: serde_json::Value::Object(Default::default()),
            ..Default::default()
        });
    }

    let after_first = &content[3..];
    let end_pos = after_first
        .find("\n---")
        .or_else(|| after_first.find("\r\n---"))
        .ok_or_else(|| {
            RegistryError::validation("SKILL.md has an opening --- but no closing ---")
        })?;

    let yaml_content = after_first[..end_pos].trim();
    let body_start = 3 + end_pos + 4;
    let body = if body_start < content.len() {
        content[body_start..].trim().to_string()
    } else {
        String::new()
    };

    let raw_yaml: serde_yaml::Value = serde_yaml::from_str(yaml_content)
        .map_err(|e| RegistryError::validation(format!("invalid SKILL.md frontmatter: {e}")))?;
    let raw = serde_json::to_value(&raw_yaml)
        .map_err(|e| RegistryError::internal(format!("frontmatter conversion: {e}")))?;
    let frontmatter: SkillFrontmatter = serde_yaml::from_value(raw_yaml)
        .map_err(|e| RegistryError::validation(format!("invalid SKILL.md frontmatter: {e}")))?;

    Ok(SkillMd { frontmatter, raw, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_frontmatter() {
        let md = parse_skill_md("---\nname: demo\ndescription: A demo skill\n---\nBody text")
            .unwrap();
        assert_eq!(md.frontmatter.name.as_deref(), Some("demo"));
        assert_eq!(md.frontmatter.description.as_deref(), Some("A demo skill"));
        assert_eq!(md.body, "Body text");
        assert_eq!(md.raw["name"], "demo");
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let md = parse_skill_md("# Just markdown\n\nNo fence here.").unwrap();
        assert!(md.frontmatter.name.is_none());
        assert!(md.body.starts_with("# Just markdown"));
    }

    #[test]
    fn test_multiline_description() {
        let md = parse_skill_md("---\nname: demo\ndescription: |\n  Line one\n  Line two\n---\n")
            .unwrap();
        let desc = md.frontmatter.description.unwrap();
        assert!(desc.contains("Line one"));
        assert!(desc.contains("Line two"));
    }

    #[test]
    fn test_nested_metadata_survives() {
        let md = parse_skill_md(
            "---\nname: demo\nmetadata:\n  moltbot:\n    emoji: \"🦀\"\n    homepage: https://example.com\n---\n",
        )
        .unwrap();
        let meta = md.frontmatter.metadata.unwrap();
        assert_eq!(meta["moltbot"]["homepage"], "https://example.com");
        // unknown keys are preserved in the raw mapping
        assert!(md.raw.get("metadata").is_some());
    }

    #[test]
    fn test_unclosed_fence_is_rejected() {
        assert!(parse_skill_md("---\nname: demo\nno closing fence").is_err());
    }
}
