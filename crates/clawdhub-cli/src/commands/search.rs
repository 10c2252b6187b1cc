use anyhow::Result;
use colored::*;

use crate::config::CliContext;

use super::open_client;

pub async fn execute(ctx: &CliContext, query: &str, limit: usize) -> Result<()> {
    let client = open_client(ctx)?;
    let results = client.search(query, limit.clamp(1, 50)).await?;

    if results.is_empty() {
        println!("No skills matched {}", format!("'{query}'").yellow());
        return Ok(());
    }

    println!();
    for result in &results {
        println!(
            "  {} {} {}",
            result.slug.cyan().bold(),
            format!("v{}", result.version).dimmed(),
            format!("(score {:.2})", result.score).dimmed()
        );
        if let Some(summary) = &result.summary {
            println!("    {}", summary);
        }
    }
    println!();
    println!(
        "{} {} result(s). Install with {}",
        "✓".green(),
        results.len(),
        "clawdhub install <slug>".cyan()
    );
    Ok(())
}
