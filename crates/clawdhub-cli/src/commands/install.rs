use anyhow::{bail, Context, Result};
use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::Path;

use crate::client::RegistryClient;
use crate::config::CliContext;
use crate::lockfile::{Lockfile, OriginMarker};

use super::open_client;

pub async fn execute(
    ctx: &CliContext,
    slug: &str,
    version: Option<&str>,
    force: bool,
) -> Result<()> {
    let client = open_client(ctx)?;

    let detail = client
        .get_skill(slug)
        .await?
        .with_context(|| format!("skill '{slug}' is not on the registry"))?;
    let version = match version {
        Some(v) => v.to_string(),
        None => {
            detail
                .latest_version
                .with_context(|| format!("skill '{slug}' has no published versions"))?
                .version
        }
    };

    let dest = ctx.install_root().join(slug);
    if dest.exists() && !force {
        if let Some(origin) = OriginMarker::load(&dest)? {
            if origin.installed_version == version {
                println!(
                    "{} {} v{} is already installed",
                    "✓".green().bold(),
                    slug.cyan(),
                    version
                );
                return Ok(());
            }
        }
        let overwrite = !ctx.no_input
            && Confirm::new()
                .with_prompt(format!("{} exists; overwrite?", dest.display()))
                .default(false)
                .interact()
                .unwrap_or(false);
        if !overwrite {
            bail!(
                "{} already exists; re-run with --force to overwrite",
                dest.display()
            );
        }
    }

    install_version(ctx, &client, slug, &version).await?;

    println!();
    println!(
        "{} Installed {} v{} into {}",
        "✓".green().bold(),
        slug.cyan(),
        version,
        dest.display()
    );
    Ok(())
}

/// Download a version and unpack it into `<workdir>/<dir>/<slug>`,
/// recording the lockfile entry and the origin marker.
pub async fn install_version(
    ctx: &CliContext,
    client: &RegistryClient,
    slug: &str,
    version: &str,
) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );

    pb.set_message(format!("Downloading {slug}@{version}..."));
    let archive = client.download(slug, version).await?;

    pb.set_message("Extracting...");
    let dest = ctx.install_root().join(slug);
    if dest.exists() {
        std::fs::remove_dir_all(&dest)
            .with_context(|| format!("Failed to clear {}", dest.display()))?;
    }
    extract_zip(&archive, &dest)?;

    OriginMarker::new(&ctx.registry, slug, version).save(&dest)?;

    let mut lockfile = Lockfile::load(&ctx.workdir)?;
    lockfile.record(slug, version);
    lockfile.save(&ctx.workdir)?;

    pb.finish_and_clear();
    Ok(())
}

/// Unpack a downloaded archive. Entry names are the original bundle
/// paths; anything escaping the destination is rejected.
fn extract_zip(archive: &[u8], dest: &Path) -> Result<()> {
    let mut zip =
        zip::ZipArchive::new(std::io::Cursor::new(archive)).context("Invalid archive")?;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).context("Corrupt archive entry")?;
        let Some(rel) = entry.enclosed_name() else {
            bail!("archive entry '{}' escapes the destination", entry.name());
        };
        let out_path = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        std::fs::write(&out_path, bytes)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
    }
    Ok(())
}
