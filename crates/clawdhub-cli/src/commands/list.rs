use anyhow::Result;
use colored::*;

use crate::config::CliContext;
use crate::lockfile::{Lockfile, OriginMarker};

pub fn execute(ctx: &CliContext) -> Result<()> {
    let lockfile = Lockfile::load(&ctx.workdir)?;

    if lockfile.skills.is_empty() {
        println!(
            "No skills installed under {}. Try {}",
            ctx.workdir.display(),
            "clawdhub install <slug>".cyan()
        );
        return Ok(());
    }

    println!();
    println!(
        "  {:<28} {:<12} {}",
        "SKILL".bold(),
        "VERSION".bold(),
        "INSTALLED".bold()
    );
    for (slug, locked) in &lockfile.skills {
        let dir = ctx.install_root().join(slug);
        let missing = if dir.is_dir() {
            ""
        } else {
            " (missing on disk)"
        };
        // prefer the origin marker's version when the folder carries one
        let version = OriginMarker::load(&dir)
            .ok()
            .flatten()
            .map(|o| o.installed_version)
            .unwrap_or_else(|| locked.version.clone());
        println!(
            "  {:<28} {:<12} {}{}",
            slug.cyan(),
            format!("v{version}"),
            locked.installed_at.format("%Y-%m-%d %H:%M"),
            missing.red()
        );
    }
    println!();
    Ok(())
}
