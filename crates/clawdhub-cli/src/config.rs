//! Global CLI configuration.
//!
//! Persisted as TOML at a platform-specific path (overridable via
//! `CLAWDHUB_CONFIG_PATH`), holding the registry URL and the opaque API
//! token. Environment variables override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SITE: &str = "https://clawdhub.dev";
pub const DEFAULT_INSTALL_DIR: &str = "skills";

/// `~/.config/clawdhub/config.toml` contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Registry base URL
    #[serde(default)]
    pub registry: Option<String>,
    /// Opaque API token
    #[serde(default)]
    pub token: Option<String>,
}

impl GlobalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}

/// Default config path, honoring `CLAWDHUB_CONFIG_PATH`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CLAWDHUB_CONFIG_PATH") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clawdhub")
        .join("config.toml")
}

/// Everything a command needs, resolved once at startup from flags, env,
/// and the config file.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Registry API base URL
    pub registry: String,
    /// Web site base URL (login hints)
    pub site: String,
    /// API token, when logged in
    pub token: Option<String>,
    /// Working directory for installs and sync
    pub workdir: PathBuf,
    /// Install directory name under the workdir
    pub install_dir: String,
    /// Never prompt
    pub no_input: bool,
    /// Where the global config lives
    pub config_path: PathBuf,
}

impl CliContext {
    /// Resolution order: CLI flag, environment, config file, default.
    pub fn resolve(
        workdir_flag: Option<PathBuf>,
        dir_flag: Option<String>,
        site_flag: Option<String>,
        registry_flag: Option<String>,
        no_input: bool,
    ) -> Result<Self> {
        let config_path = config_path();
        let config = GlobalConfig::load(&config_path)?;

        let site = site_flag
            .or_else(|| std::env::var("CLAWDHUB_SITE").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_SITE.to_string());
        let registry = registry_flag
            .or_else(|| std::env::var("CLAWDHUB_REGISTRY").ok().filter(|s| !s.is_empty()))
            .or_else(|| config.registry.clone())
            .unwrap_or_else(|| format!("{}/api/v1", site.trim_end_matches('/')));
        let workdir = workdir_flag
            .or_else(|| {
                std::env::var("CLAWDHUB_WORKDIR")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        Ok(Self {
            registry,
            site,
            token: config.token,
            workdir,
            install_dir: dir_flag.unwrap_or_else(|| DEFAULT_INSTALL_DIR.to_string()),
            no_input,
            config_path,
        })
    }

    /// Directory skills are installed into.
    pub fn install_root(&self) -> PathBuf {
        self.workdir.join(&self.install_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = GlobalConfig {
            registry: Some("https://example.com/api/v1".to_string()),
            token: Some("tok_secret".to_string()),
        };
        config.save(&path).unwrap();

        let loaded = GlobalConfig::load(&path).unwrap();
        assert_eq!(loaded.registry.as_deref(), Some("https://example.com/api/v1"));
        assert_eq!(loaded.token.as_deref(), Some("tok_secret"));
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = GlobalConfig::load(&dir.path().join("none.toml")).unwrap();
        assert!(loaded.registry.is_none());
        assert!(loaded.token.is_none());
    }
}
