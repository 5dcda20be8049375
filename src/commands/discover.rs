use super::{build_client, build_registry, CommandOptions};
use crate::context::Context;
use crate::export::{summary, DiscoveryEngine, ScopeFilter};
use anyhow::{Context as _, Result};

pub struct DiscoverCommand;

impl DiscoverCommand {
    /// Count resources per type without converting anything
    pub fn execute(ctx: &Context, options: &CommandOptions) -> Result<()> {
        let config = options.resolve_config(ctx)?;
        let registry = build_registry(&config)?;
        let entries = registry.filtered(&config.types)?;
        let client = build_client(ctx, options, &config, &registry)?;

        let engine = DiscoveryEngine::new(client)
            .with_products(config.products.clone())
            .with_lakes(config.lakes.clone());

        let scopes = engine
            .list_scopes(&ScopeFilter::allow(&config.groups))
            .context("Failed to list groups")?;
        summary::print_scopes(ctx.output.as_ref(), &scopes);

        let results = engine.discover(&entries, &scopes);
        summary::print_discovery(ctx.output.as_ref(), &results);

        Ok(())
    }
}
