use anyhow::{bail, Context, Result};
use colored::*;
use dialoguer::Password;

use crate::client::RegistryClient;
use crate::config::{CliContext, GlobalConfig};

pub async fn execute(ctx: &CliContext, token: Option<&str>) -> Result<()> {
    let token = match token {
        Some(t) => t.to_string(),
        None => {
            if ctx.no_input {
                bail!("--no-input given but no --token; pass the token explicitly");
            }
            println!(
                "Create an API token at {} and paste it below.",
                format!("{}/settings/tokens", ctx.site).cyan()
            );
            Password::new()
                .with_prompt("API token")
                .interact()
                .context("Failed to read token")?
        }
    };

    // validate before persisting anything
    let client = RegistryClient::new(&ctx.registry, Some(token.clone()))?;
    let user = client
        .whoami()
        .await
        .context("Token verification failed")?;

    let mut config = GlobalConfig::load(&ctx.config_path)?;
    config.registry = Some(ctx.registry.clone());
    config.token = Some(token);
    config.save(&ctx.config_path)?;

    println!(
        "{} Logged in as {}",
        "✓".green().bold(),
        user.handle.as_deref().unwrap_or(&user.display_name).cyan()
    );
    Ok(())
}

pub fn logout(ctx: &CliContext) -> Result<()> {
    let mut config = GlobalConfig::load(&ctx.config_path)?;
    if config.token.take().is_none() {
        println!("Not logged in.");
        return Ok(());
    }
    config.save(&ctx.config_path)?;
    println!("{} Logged out", "✓".green().bold());
    Ok(())
}
