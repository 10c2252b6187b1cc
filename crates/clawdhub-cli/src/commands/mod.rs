//! CLI command implementations.

pub mod delete;
pub mod explore;
pub mod install;
pub mod list;
pub mod login;
pub mod publish;
pub mod search;
pub mod sync;
pub mod update;
pub mod whoami;

use crate::client::RegistryClient;
use crate::config::CliContext;
use anyhow::{bail, Result};

/// Client for endpoints that do not need authentication.
pub(crate) fn open_client(ctx: &CliContext) -> Result<RegistryClient> {
    RegistryClient::new(&ctx.registry, ctx.token.clone())
}

/// Client for endpoints that require a bearer token.
pub(crate) fn authed_client(ctx: &CliContext) -> Result<RegistryClient> {
    if ctx.token.is_none() {
        bail!(
            "not logged in. Run `clawdhub login` (get a token at {})",
            ctx.site
        );
    }
    open_client(ctx)
}
