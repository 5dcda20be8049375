pub mod discover;
pub mod export;
pub mod types;

pub use discover::DiscoverCommand;
pub use export::{ExportCommand, ExportOptions};
pub use types::TypesCommand;

use crate::config::ExportConfig;
use crate::context::Context;
use crate::export::{ApiClient, Registry, RestClient, SnapshotClient};
use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    pub config: Option<PathBuf>,
    pub base_url: Option<String>,
    /// Answer API calls from a recorded snapshot instead of the network
    pub snapshot: Option<PathBuf>,
    pub products: Vec<String>,
    pub groups: Vec<String>,
    pub types: Vec<String>,
}

impl CommandOptions {
    /// Load the config file and apply command-line overrides
    pub fn resolve_config(&self, ctx: &Context) -> Result<ExportConfig> {
        let mut config = ExportConfig::load(ctx.fs.as_ref(), self.config.as_deref())?;

        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if !self.products.is_empty() {
            config.products = self.products.clone();
        }
        if !self.groups.is_empty() {
            config.groups = self.groups.clone();
        }
        if !self.types.is_empty() {
            config.types = self.types.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn build_registry(config: &ExportConfig) -> Result<Arc<Registry>> {
    let registry = Registry::with_catalog(&config.overrides).context("Failed to build type registry")?;
    Ok(Arc::new(registry))
}

/// Snapshot client when one is given, otherwise the HTTP client
fn build_client(
    ctx: &Context,
    options: &CommandOptions,
    config: &ExportConfig,
    registry: &Registry,
) -> Result<Arc<dyn ApiClient>> {
    if let Some(path) = &options.snapshot {
        info!(path = %path.display(), "using recorded snapshot");
        let client = SnapshotClient::load(ctx.fs.as_ref(), path)
            .with_context(|| format!("Failed to load snapshot: {:?}", path))?;
        return Ok(Arc::new(client));
    }

    let connection = config.connection(|name| std::env::var(name).ok())?;
    info!(base_url = %connection.base_url, "connecting");
    let client = RestClient::for_registry(&connection.base_url, connection.token, registry)
        .context("Failed to create API client")?;
    Ok(Arc::new(client))
}
