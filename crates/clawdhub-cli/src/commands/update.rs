use anyhow::{bail, Context, Result};
use colored::*;
use dialoguer::Confirm;
use semver::Version;

use crate::config::CliContext;
use crate::lockfile::Lockfile;
use crate::scan::load_skill_dir;

use super::{install::install_version, open_client};

pub async fn execute(
    ctx: &CliContext,
    slug: Option<&str>,
    _all: bool,
    version: Option<&str>,
    force: bool,
) -> Result<()> {
    let lockfile = Lockfile::load(&ctx.workdir)?;

    // no slug means everything in the lockfile, --all or not
    let slugs: Vec<String> = match slug {
        Some(slug) => vec![slug.to_string()],
        None => {
            if lockfile.skills.is_empty() {
                bail!(
                    "no skills installed under {} (run `clawdhub install <slug>` first)",
                    ctx.workdir.display()
                );
            }
            lockfile.skills.keys().cloned().collect()
        }
    };

    let mut failures = 0;
    for slug in &slugs {
        if let Err(e) = update_one(ctx, slug, version, force).await {
            failures += 1;
            eprintln!("{} {}: {}", "✗".red().bold(), slug, e);
        }
    }
    if failures > 0 {
        bail!("{failures} update(s) failed");
    }
    Ok(())
}

async fn update_one(
    ctx: &CliContext,
    slug: &str,
    version: Option<&str>,
    force: bool,
) -> Result<()> {
    let client = open_client(ctx)?;
    let dir = ctx.install_root().join(slug);
    if !dir.is_dir() {
        bail!("{} is not installed (missing {})", slug, dir.display());
    }

    let detail = client
        .get_skill(slug)
        .await?
        .with_context(|| format!("skill '{slug}' is not on the registry"))?;
    let latest = detail
        .latest_version
        .with_context(|| format!("skill '{slug}' has no published versions"))?
        .version;
    let target = version.unwrap_or(&latest).to_string();

    // hash the installed folder and ask the registry what it is
    let local = load_skill_dir(&dir)?;
    let resolved = client.resolve(slug, &local.fingerprint).await?;

    match resolved.matched {
        Some(matched) => {
            let at_or_past_latest = match (Version::parse(&matched.version), Version::parse(&latest))
            {
                (Ok(local_v), Ok(latest_v)) => local_v >= latest_v,
                _ => matched.version == latest,
            };
            if at_or_past_latest && version.is_none() {
                println!(
                    "{} {} v{} is up to date",
                    "✓".green().bold(),
                    slug.cyan(),
                    matched.version
                );
                return Ok(());
            }
        }
        None => {
            // the local folder matches no published version
            let proceed = force
                || (!ctx.no_input
                    && Confirm::new()
                        .with_prompt(format!(
                            "{slug} has local modifications; overwrite with v{target}?"
                        ))
                        .default(false)
                        .interact()
                        .unwrap_or(false));
            if !proceed {
                bail!("local modifications detected; re-run with --force to overwrite");
            }
        }
    }

    install_version(ctx, &client, slug, &target).await?;
    println!(
        "{} Updated {} to v{}",
        "✓".green().bold(),
        slug.cyan(),
        target
    );
    Ok(())
}
