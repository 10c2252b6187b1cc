use anyhow::{bail, Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::PathBuf;

use crate::client::{RegistryClient, UploadFile};
use crate::config::CliContext;
use crate::plan::{initial_version, next_version, Bump};
use crate::scan::{load_skill_dir, LocalSkill};

use super::authed_client;

pub struct PublishArgs<'a> {
    pub ctx: &'a CliContext,
    pub path: PathBuf,
    pub slug: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub changelog: Option<String>,
    pub tags: Vec<String>,
    pub fork_of: Option<String>,
}

pub async fn execute(args: PublishArgs<'_>) -> Result<()> {
    let client = authed_client(args.ctx)?;

    let mut skill = load_skill_dir(&args.path)
        .with_context(|| format!("Failed to load skill from {}", args.path.display()))?;
    if let Some(slug) = args.slug {
        skill.slug = slug;
    }
    if let Some(name) = args.name {
        skill.display_name = name;
    }

    let version = match args.version {
        Some(v) => v,
        None => match client.get_skill(&skill.slug).await? {
            Some(detail) => match detail.latest_version {
                Some(latest) => next_version(&latest.version, Bump::Patch)?,
                None => initial_version(),
            },
            None => initial_version(),
        },
    };

    let outcome = publish_skill(
        &client,
        &skill,
        &version,
        args.changelog.as_deref(),
        &args.tags,
        args.fork_of.as_deref(),
    )
    .await?;

    println!();
    println!(
        "{} Published {} v{}",
        "✓".green().bold(),
        outcome.slug.cyan(),
        outcome.version
    );
    println!("  {} {}", "Fingerprint:".dimmed(), outcome.fingerprint);
    if outcome.created {
        println!("  {} first version of a new skill", "→".dimmed());
    }
    Ok(())
}

/// Upload one bundle as a multipart publish, with per-file progress.
pub async fn publish_skill(
    client: &RegistryClient,
    skill: &LocalSkill,
    version: &str,
    changelog: Option<&str>,
    tags: &[String],
    fork_of: Option<&str>,
) -> Result<crate::client::PublishResponse> {
    let mut payload = json!({
        "slug": skill.slug,
        "displayName": skill.display_name,
        "version": version,
        "changelog": changelog.unwrap_or_default(),
        "source": "cli",
    });
    if !tags.is_empty() {
        payload["tags"] = json!(tags);
    }
    if let Some(fork_of) = fork_of {
        payload["forkOf"] = parse_fork_of(fork_of)?;
    }

    let pb = ProgressBar::new(skill.files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:30.cyan/dim} {pos}/{len} {msg}")
            .unwrap(),
    );

    let mut files = Vec::with_capacity(skill.files.len());
    for file in &skill.files {
        pb.set_message(file.rel_path.clone());
        let bytes = std::fs::read(&file.abs_path)
            .with_context(|| format!("Failed to read {}", file.abs_path.display()))?;
        files.push(UploadFile { path: file.rel_path.clone(), bytes });
        pb.inc(1);
    }
    pb.finish_and_clear();

    client.publish(&payload, files).await
}

/// Parse `slug` or `slug@version`.
fn parse_fork_of(value: &str) -> Result<serde_json::Value> {
    match value.split_once('@') {
        Some((slug, version)) => {
            if slug.is_empty() || version.is_empty() {
                bail!("--fork-of expects slug or slug@version, got '{value}'");
            }
            Ok(json!({ "slug": slug, "version": version }))
        }
        None => Ok(json!({ "slug": value })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fork_of() {
        assert_eq!(
            parse_fork_of("upstream").unwrap(),
            json!({ "slug": "upstream" })
        );
        assert_eq!(
            parse_fork_of("upstream@1.2.0").unwrap(),
            json!({ "slug": "upstream", "version": "1.2.0" })
        );
        assert!(parse_fork_of("@1.0.0").is_err());
        assert!(parse_fork_of("upstream@").is_err());
    }
}
