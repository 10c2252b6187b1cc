use anyhow::{bail, Result};
use colored::*;

use crate::config::CliContext;

use super::open_client;

/// Truncate to exactly `max` characters, the ellipsis included.
fn truncate_summary(summary: &str, max: usize) -> String {
    let count = summary.chars().count();
    if count <= max {
        return summary.to_string();
    }
    let mut out: String = summary.chars().take(max - 1).collect();
    out.push('…');
    out
}

pub async fn execute(ctx: &CliContext, limit: usize) -> Result<()> {
    if !(1..=50).contains(&limit) {
        bail!("--limit must be between 1 and 50");
    }

    let client = open_client(ctx)?;
    let page = client.list_skills(limit, "trending").await?;

    if page.skills.is_empty() {
        println!("The registry is empty.");
        return Ok(());
    }

    println!();
    println!("{}", "Trending skills".bold());
    println!("{}", "─".repeat(50));
    for skill in &page.skills {
        let latest = skill
            .tags
            .contains_key("latest")
            .then_some("")
            .unwrap_or(" (unpublished)");
        println!("  {}{}", skill.slug.cyan().bold(), latest.dimmed());
        if let Some(summary) = &skill.summary {
            println!("    {}", truncate_summary(summary, 50));
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_is_exactly_fifty_with_ellipsis() {
        let long = "x".repeat(80);
        let truncated = truncate_summary(&long, 50);
        assert_eq!(truncated.chars().count(), 50);
        assert!(truncated.ends_with('…'));

        let exact = "y".repeat(50);
        assert_eq!(truncate_summary(&exact, 50), exact);

        let short = "short";
        assert_eq!(truncate_summary(short, 50), "short");
    }
}
