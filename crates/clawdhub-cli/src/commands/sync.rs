use anyhow::{bail, Context, Result};
use colored::*;
use dialoguer::{Input, MultiSelect};
use std::path::PathBuf;

use crate::config::CliContext;
use crate::plan::{classify_all, initial_version, next_version, Bump, PlanItem, SyncStatus};
use crate::scan::{dedupe_by_slug, discover_roots, load_skill_dir, scan_root};

use super::{authed_client, publish::publish_skill};

pub struct SyncArgs<'a> {
    pub ctx: &'a CliContext,
    pub roots: Vec<PathBuf>,
    pub all: bool,
    pub dry_run: bool,
    pub bump: String,
    pub changelog: Option<String>,
    pub tags: Vec<String>,
    pub concurrency: usize,
}

pub async fn execute(args: SyncArgs<'_>) -> Result<()> {
    let ctx = args.ctx;
    let bump: Bump = args.bump.parse()?;
    if !(1..=32).contains(&args.concurrency) {
        bail!("--concurrency must be between 1 and 32");
    }
    let client = authed_client(ctx)?;

    // 1-2. discover roots and scan them
    let roots = discover_roots(&args.roots, &ctx.workdir);
    let mut folders = Vec::new();
    for root in &roots {
        folders.extend(scan_root(root));
    }
    if folders.is_empty() {
        bail!(
            "no skill folders found under {} root(s); a skill folder contains a SKILL.md.\n\
             Point sync somewhere with --root <dir> or --workdir <dir>.",
            roots.len()
        );
    }

    let mut skills = Vec::new();
    for folder in &folders {
        match load_skill_dir(folder) {
            Ok(skill) => skills.push(skill),
            Err(e) => eprintln!("{} skipping {}: {e}", "⚠".yellow(), folder.display()),
        }
    }

    // 3. dedupe by slug, first folder wins
    let (skills, skipped) = dedupe_by_slug(skills);
    for (slug, dir) in &skipped {
        eprintln!(
            "{} duplicate slug '{}' at {} (first folder wins)",
            "⚠".yellow(),
            slug,
            dir.display()
        );
    }

    // 4-5. hash + classify against the registry
    println!(
        "{} Checking {} skill(s) against {}...",
        "→".cyan(),
        skills.len(),
        ctx.registry.dimmed()
    );
    let plan = classify_all(&client, skills, args.concurrency).await?;

    // 6. present the plan
    let synced: Vec<&PlanItem> = plan.iter().filter(|i| !i.is_actionable()).collect();
    let actionable: Vec<&PlanItem> = plan.iter().filter(|i| i.is_actionable()).collect();

    println!();
    if !synced.is_empty() {
        println!(
            "  {} {} skill(s) already synced",
            "✓".green(),
            synced.len()
        );
    }
    for item in &actionable {
        match &item.status {
            SyncStatus::New => println!(
                "  {} {} {} ({})",
                "+".green().bold(),
                item.skill.slug.cyan(),
                "new".green(),
                item.skill.dir.display()
            ),
            SyncStatus::Update { latest } => println!(
                "  {} {} {} (registry has {})",
                "~".yellow().bold(),
                item.skill.slug.cyan(),
                "update".yellow(),
                latest.as_deref().unwrap_or("no versions")
            ),
            SyncStatus::Synced { .. } => {}
        }
    }

    // 9. dry run stops here, synced or not
    if args.dry_run {
        println!();
        println!("{} nothing published.", "Dry run:".bold());
        for item in &actionable {
            let version = planned_version(item, bump)?;
            println!("  would publish {}@{}", item.skill.slug.cyan(), version);
        }
        for item in &synced {
            if let SyncStatus::Synced { version } = &item.status {
                println!("  {}@{} unchanged", item.skill.slug.dimmed(), version.dimmed());
            }
        }
        return Ok(());
    }

    if actionable.is_empty() {
        println!();
        println!("{} Everything is in sync.", "✓".green().bold());
        return Ok(());
    }

    // 7. select items
    let selected: Vec<&PlanItem> = if args.all || ctx.no_input {
        actionable.clone()
    } else {
        let labels: Vec<String> = actionable
            .iter()
            .map(|item| {
                let action = match &item.status {
                    SyncStatus::New => "new",
                    SyncStatus::Update { .. } => "update",
                    SyncStatus::Synced { .. } => "synced",
                };
                format!("{} ({action})", item.skill.slug)
            })
            .collect();
        let defaults = vec![true; labels.len()];
        let chosen = MultiSelect::new()
            .with_prompt("Select skills to publish")
            .items(&labels)
            .defaults(&defaults)
            .interact()
            .context("Selection cancelled")?;
        chosen.into_iter().map(|i| actionable[i]).collect()
    };

    if selected.is_empty() {
        println!("Nothing selected.");
        return Ok(());
    }

    // 8. publish each selected item
    let mut published = 0usize;
    let mut failures = 0usize;
    for item in selected {
        let version = planned_version(item, bump)?;
        let changelog = match &args.changelog {
            Some(text) => Some(text.clone()),
            None if !ctx.no_input => {
                let text: String = Input::new()
                    .with_prompt(format!("Changelog for {}@{version} (empty = auto)", item.skill.slug))
                    .allow_empty(true)
                    .interact_text()
                    .unwrap_or_default();
                (!text.trim().is_empty()).then_some(text)
            }
            None => None,
        };

        println!();
        println!(
            "{} Publishing {}@{}...",
            "→".cyan(),
            item.skill.slug.cyan().bold(),
            version
        );
        match publish_skill(
            &client,
            &item.skill,
            &version,
            changelog.as_deref(),
            &args.tags,
            None,
        )
        .await
        {
            Ok(outcome) => {
                published += 1;
                println!(
                    "{} {}@{} published",
                    "✓".green().bold(),
                    outcome.slug.cyan(),
                    outcome.version
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {e}", "✗".red().bold(), item.skill.slug);
            }
        }
    }

    println!();
    println!(
        "{} {published} published, {failures} failed, {} already synced",
        if failures == 0 { "✓".green().bold() } else { "⚠".yellow().bold() },
        synced.len()
    );
    if failures > 0 {
        bail!("{failures} publish(es) failed");
    }
    Ok(())
}

/// Version the plan would publish: `1.0.0` for new skills, a bump of the
/// registry latest for updates.
fn planned_version(item: &PlanItem, bump: Bump) -> Result<String> {
    match &item.status {
        SyncStatus::New => Ok(initial_version()),
        SyncStatus::Update { latest } => match latest {
            Some(latest) => next_version(latest, bump),
            None => Ok(initial_version()),
        },
        SyncStatus::Synced { version } => Ok(version.clone()),
    }
}
