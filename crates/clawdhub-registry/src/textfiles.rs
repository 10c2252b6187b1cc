//! Text-file allow-list and path sanitation.
//!
//! Bundles are text-only: a file is accepted when its path extension or
//! declared content type is on the allow-list. The same predicate runs at
//! publish time on the server and during local scanning in the CLI.

/// Extensions (lowercase, without dot) accepted for bundle files.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "md", "markdown", "mdx", "txt", "text", "rst", "adoc",
    "yaml", "yml", "json", "jsonc", "toml", "ini", "cfg", "conf", "env",
    "csv", "tsv", "xml", "html", "htm", "css",
    "js", "mjs", "cjs", "ts", "tsx", "jsx",
    "py", "rb", "sh", "bash", "zsh", "fish", "ps1", "bat", "sql", "lua",
];

/// Extension-less file names accepted as text.
const ALLOWED_BARE_NAMES: &[&str] = &[
    "license", "readme", "changelog", "notice", "makefile", "dockerfile",
    ".gitignore", ".gitattributes", ".editorconfig", ".env.example",
];

/// Content types accepted for bundle files.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/x-yaml",
    "application/yaml",
    "application/toml",
    "application/xml",
    "application/javascript",
    "application/typescript",
    "application/x-sh",
    "application/sql",
];

/// Whether a file is accepted, judging by path extension or declared
/// content type (either one qualifying is enough).
pub fn is_allowed(path: &str, content_type: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        let ct = ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase();
        if ct.starts_with("text/") || ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) {
            return true;
        }
    }

    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    if ALLOWED_BARE_NAMES.contains(&name.as_str()) {
        return true;
    }
    match name.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Validate a relative bundle path: non-empty, no leading `/`, no `..`
/// component, no backslashes.
pub fn sanitize_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty path".to_string());
    }
    if path.contains('\\') {
        return Err(format!("path '{}' contains a backslash", path));
    }
    if path.starts_with('/') {
        return Err(format!("path '{}' is absolute", path));
    }
    if path.split('/').any(|c| c == "..") {
        return Err(format!("path '{}' contains a '..' component", path));
    }
    if path.split('/').any(|c| c.is_empty()) {
        return Err(format!("path '{}' contains an empty component", path));
    }
    Ok(())
}

/// Whether `path` names the skill manifest (`SKILL.md` or `skills.md`,
/// case-insensitively), at any directory depth.
pub fn is_skill_md(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.eq_ignore_ascii_case("SKILL.md") || name.eq_ignore_ascii_case("skills.md")
}

/// Whether a path looks like markdown (excluded from the plain-text part
/// of the embedding input).
pub fn is_markdown(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown") || lower.ends_with(".mdx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed("SKILL.md", None));
        assert!(is_allowed("scripts/run.sh", None));
        assert!(is_allowed("config.yaml", None));
        assert!(is_allowed("LICENSE", None));
        assert!(!is_allowed("logo.png", None));
        assert!(!is_allowed("binary.wasm", None));
    }

    #[test]
    fn test_content_type_overrides_extension() {
        assert!(is_allowed("notes", Some("text/plain")));
        assert!(is_allowed("data.bin", Some("application/json")));
        assert!(is_allowed("doc", Some("text/markdown; charset=utf-8")));
        assert!(!is_allowed("img", Some("image/png")));
    }

    #[test]
    fn test_sanitize_path() {
        assert!(sanitize_path("SKILL.md").is_ok());
        assert!(sanitize_path("docs/usage.md").is_ok());
        assert!(sanitize_path("").is_err());
        assert!(sanitize_path("/etc/passwd").is_err());
        assert!(sanitize_path("../escape.md").is_err());
        assert!(sanitize_path("a/../b.md").is_err());
        assert!(sanitize_path("dir\\file.md").is_err());
        assert!(sanitize_path("a//b.md").is_err());
    }

    #[test]
    fn test_is_skill_md() {
        assert!(is_skill_md("SKILL.md"));
        assert!(is_skill_md("skill.MD"));
        assert!(is_skill_md("skills.md"));
        assert!(is_skill_md("nested/SKILL.md"));
        assert!(!is_skill_md("SKILLS.txt"));
        assert!(!is_skill_md("myskill.md"));
    }
}
