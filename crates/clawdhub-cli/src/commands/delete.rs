use anyhow::{bail, Context, Result};
use colored::*;
use dialoguer::Confirm;

use crate::config::CliContext;

use super::authed_client;

/// Soft-delete (or restore) a skill on the registry.
pub async fn execute(ctx: &CliContext, slug: &str, yes: bool, delete: bool) -> Result<()> {
    let verb = if delete { "delete" } else { "restore" };

    if !yes {
        if ctx.no_input {
            bail!("--no-input given; pass --yes to {verb} '{slug}'");
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Really {verb} '{slug}'?"))
            .default(false)
            .interact()
            .context("Confirmation cancelled")?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let client = authed_client(ctx)?;
    if delete {
        client.soft_delete(slug).await?;
        println!(
            "{} {} deleted (restore with {})",
            "✓".green().bold(),
            slug.cyan(),
            format!("clawdhub undelete {slug}").cyan()
        );
    } else {
        client.undelete(slug).await?;
        println!("{} {} restored", "✓".green().bold(), slug.cyan());
    }
    Ok(())
}
