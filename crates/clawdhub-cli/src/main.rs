use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use clawdhub_cli::commands;
use clawdhub_cli::config::CliContext;

#[derive(Parser)]
#[command(name = "clawdhub")]
#[command(about = "ClawdHub - publish, sync, and install agent skill bundles", long_about = None)]
#[command(version)]
struct Cli {
    /// Working directory for installs and sync
    #[arg(long, global = true, env = "CLAWDHUB_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Install directory name under the workdir (default: skills)
    #[arg(long, global = true)]
    dir: Option<String>,

    /// Web site base URL
    #[arg(long, global = true, env = "CLAWDHUB_SITE")]
    site: Option<String>,

    /// Registry API base URL
    #[arg(long, global = true, env = "CLAWDHUB_REGISTRY")]
    registry: Option<String>,

    /// Never prompt; fail instead of asking
    #[arg(long, global = true)]
    no_input: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an API token for the configured registry
    ///
    /// Examples:
    ///   clawdhub login --token clh_xxxx
    ///   clawdhub login                    # interactive prompt
    Login {
        /// API token (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Forget the stored API token
    Logout,

    /// Show the authenticated user
    Whoami,

    /// Search the registry
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Browse trending skills
    Explore {
        /// Number of skills to show (1-50)
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Install a skill into the workdir
    ///
    /// Examples:
    ///   clawdhub install gif-encoder
    ///   clawdhub install gif-encoder --version 1.2.0
    Install {
        /// Skill slug
        slug: String,

        /// Version to install (default: latest)
        #[arg(long)]
        version: Option<String>,

        /// Overwrite local changes without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Update installed skills to the latest version
    Update {
        /// Skill slug (all installed skills when omitted)
        slug: Option<String>,

        /// Update everything in the lockfile
        #[arg(long)]
        all: bool,

        /// Target version (default: latest)
        #[arg(long)]
        version: Option<String>,

        /// Overwrite local changes without asking
        #[arg(short, long)]
        force: bool,
    },

    /// List installed skills
    #[command(alias = "ls")]
    List,

    /// Publish a single skill folder
    ///
    /// Examples:
    ///   clawdhub publish ./my-skill
    ///   clawdhub publish ./my-skill --version 2.0.0 --tags stable,beta
    ///   clawdhub publish ./my-skill --fork-of upstream-skill@1.0.0
    Publish {
        /// Path to the skill folder
        path: PathBuf,

        /// Override the slug derived from the folder
        #[arg(long)]
        slug: Option<String>,

        /// Override the display name
        #[arg(long)]
        name: Option<String>,

        /// Version to publish (default: bump of the registry latest)
        #[arg(long)]
        version: Option<String>,

        /// Changelog text (server auto-generates when empty)
        #[arg(long)]
        changelog: Option<String>,

        /// Extra tags to point at the new version
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Publish as a fork of an upstream skill (slug[@version])
        #[arg(long = "fork-of")]
        fork_of: Option<String>,
    },

    /// Scan local roots and publish what changed
    ///
    /// Examples:
    ///   clawdhub sync --dry-run
    ///   clawdhub sync --all --bump minor
    ///   clawdhub sync --root ~/skills --root ./extra --concurrency 8
    Sync {
        /// Additional roots to scan
        #[arg(long = "root")]
        roots: Vec<PathBuf>,

        /// Publish all actionable items without prompting
        #[arg(long)]
        all: bool,

        /// Print the plan without publishing
        #[arg(long)]
        dry_run: bool,

        /// Version bump for updates (patch, minor, major)
        #[arg(long, default_value = "patch")]
        bump: String,

        /// Changelog applied to every published item
        #[arg(long)]
        changelog: Option<String>,

        /// Extra tags applied to every published item
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Parallel registry calls (1-32)
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Soft-delete a skill you own
    Delete {
        /// Skill slug
        slug: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Restore a soft-deleted skill
    Undelete {
        /// Skill slug
        slug: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log to stderr so stdout stays clean for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let ctx = CliContext::resolve(cli.workdir, cli.dir, cli.site, cli.registry, cli.no_input)?;

    let result = match cli.command {
        Commands::Login { token } => commands::login::execute(&ctx, token.as_deref()).await,
        Commands::Logout => commands::login::logout(&ctx),
        Commands::Whoami => commands::whoami::execute(&ctx).await,
        Commands::Search { query, limit } => {
            commands::search::execute(&ctx, &query.join(" "), limit).await
        }
        Commands::Explore { limit } => commands::explore::execute(&ctx, limit).await,
        Commands::Install { slug, version, force } => {
            commands::install::execute(&ctx, &slug, version.as_deref(), force).await
        }
        Commands::Update { slug, all, version, force } => {
            commands::update::execute(&ctx, slug.as_deref(), all, version.as_deref(), force).await
        }
        Commands::List => commands::list::execute(&ctx),
        Commands::Publish { path, slug, name, version, changelog, tags, fork_of } => {
            commands::publish::execute(commands::publish::PublishArgs {
                ctx: &ctx,
                path,
                slug,
                name,
                version,
                changelog,
                tags: tags.unwrap_or_default(),
                fork_of,
            })
            .await
        }
        Commands::Sync { roots, all, dry_run, bump, changelog, tags, concurrency } => {
            commands::sync::execute(commands::sync::SyncArgs {
                ctx: &ctx,
                roots,
                all,
                dry_run,
                bump,
                changelog,
                tags: tags.unwrap_or_default(),
                concurrency,
            })
            .await
        }
        Commands::Delete { slug, yes } => commands::delete::execute(&ctx, &slug, yes, true).await,
        Commands::Undelete { slug, yes } => {
            commands::delete::execute(&ctx, &slug, yes, false).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "Caused by:".dimmed(), cause);
        }
        std::process::exit(1);
    }

    Ok(())
}
