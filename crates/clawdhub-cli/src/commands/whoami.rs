use anyhow::Result;
use colored::*;

use crate::config::CliContext;

use super::authed_client;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let client = authed_client(ctx)?;
    let user = client.whoami().await?;

    match user.handle {
        Some(handle) => println!("{} ({})", handle.cyan().bold(), user.display_name),
        None => println!("{}", user.display_name.cyan().bold()),
    }
    Ok(())
}
