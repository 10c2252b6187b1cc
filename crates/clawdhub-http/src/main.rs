//! `clawdhub-server` - standalone registry server binary.

use anyhow::{Context, Result};
use clap::Parser;
use clawdhub_http::{HttpServer, HttpServerConfig};
use clawdhub_registry::{
    sha256_hex, ApiToken, BasicSummarizer, EmbeddingConfig, FsObjectStore,
    HttpEmbeddingProvider, MemoryObjectStore, MemoryStore, MetadataStore, NoopHooks, ObjectStore,
    Registry, Role, User,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "clawdhub-server")]
#[command(about = "ClawdHub registry server", long_about = None)]
#[command(version)]
struct Args {
    /// Host to bind to (default 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (default 3000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for blob storage (in-memory when omitted)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to a TOML deployment config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Deployment config. OAuth is an external collaborator; a deployment
/// seeds its principals and opaque tokens here (or provisions them
/// through the metadata store directly).
#[derive(Debug, Default, Deserialize)]
struct DeployConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    embeddings: Option<EmbeddingConfig>,
    #[serde(default)]
    seed_users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    id: String,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    /// Opaque API token; only its hash is stored.
    token: String,
}

fn parse_role(role: Option<&str>) -> Role {
    match role {
        Some("admin") => Role::Admin,
        Some("moderator") => Role::Moderator,
        _ => Role::User,
    }
}

async fn seed_principals(store: &dyn MetadataStore, seeds: &[SeedUser]) -> Result<()> {
    for seed in seeds {
        let user = User {
            id: seed.id.clone(),
            handle: seed.handle.clone(),
            display_name: seed
                .display_name
                .clone()
                .or_else(|| seed.handle.clone())
                .unwrap_or_else(|| seed.id.clone()),
            image: None,
            role: parse_role(seed.role.as_deref()),
            deleted_at: None,
        };
        store.put_user(&user).await?;
        store
            .put_token(&ApiToken {
                id: clawdhub_registry::types::new_id(),
                token_hash: sha256_hex(seed.token.as_bytes()),
                user_id: seed.id.clone(),
                label: "seeded".to_string(),
                created_at: chrono::Utc::now(),
                revoked_at: None,
            })
            .await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let deploy: DeployConfig = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        }
        None => DeployConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    seed_principals(store.as_ref(), &deploy.seed_users).await?;
    if !deploy.seed_users.is_empty() {
        info!(count = deploy.seed_users.len(), "seeded principals");
    }

    let data_dir = args.data_dir.or(deploy.data_dir);
    let objects: Arc<dyn ObjectStore> = match &data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using filesystem blob storage");
            Arc::new(FsObjectStore::new(dir.join("blobs"))?)
        }
        None => Arc::new(MemoryObjectStore::new()),
    };

    let embeddings = Arc::new(HttpEmbeddingProvider::new(
        deploy.embeddings.unwrap_or_default(),
    ));

    let registry = Arc::new(Registry::new(
        store,
        objects,
        embeddings,
        Arc::new(BasicSummarizer),
        Arc::new(NoopHooks),
    ));

    let config = HttpServerConfig {
        host: args
            .host
            .or(deploy.host)
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port: args.port.or(deploy.port).unwrap_or(3000),
        ..Default::default()
    };

    HttpServer::with_config(config, registry).run().await
}
