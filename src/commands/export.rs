use super::{build_client, build_registry, CommandOptions};
use crate::context::Context;
use crate::export::{summary, DiscoveryEngine, ExportPipeline, Generator, Layout, ScopeFilter};
use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing::info;

/// Options only the export command takes
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub output: Option<PathBuf>,
    pub layout: Option<Layout>,
    pub parallelism: Option<usize>,
    /// Remove previously generated files before writing
    pub clean: bool,
}

pub struct ExportCommand;

impl ExportCommand {
    /// Discover, export and write. Partial failures are reported in the
    /// summary and do not fail the command.
    pub fn execute(ctx: &Context, options: &CommandOptions, export: &ExportOptions) -> Result<()> {
        let mut config = options.resolve_config(ctx)?;
        if let Some(output) = &export.output {
            config.output_dir = output.clone();
        }
        if let Some(layout) = export.layout {
            config.layout = layout;
        }
        if let Some(parallelism) = export.parallelism {
            config.parallelism = parallelism;
        }
        config.validate()?;

        let registry = build_registry(&config)?;
        let entries = registry.filtered(&config.types)?;
        let client = build_client(ctx, options, &config, &registry)?;

        let engine = DiscoveryEngine::new(client.clone())
            .with_products(config.products.clone())
            .with_lakes(config.lakes.clone());
        let scopes = engine
            .list_scopes(&ScopeFilter::allow(&config.groups))
            .context("Failed to list groups")?;
        let discovery = engine.discover(&entries, &scopes);

        let pipeline = ExportPipeline::with_options(
            client,
            registry,
            config.skip_rules(),
            config.lakes.clone(),
        )
        .with_parallelism(config.parallelism);

        let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        let outcome = runtime.block_on(pipeline.export(&discovery, &scopes));
        drop(runtime);

        let generator = Generator::new(ctx.fs.as_ref())
            .with_layout(config.layout)
            .with_provider(config.provider_pin());

        if export.clean {
            let removed = generator
                .clean(&config.output_dir)
                .context("Failed to clean output directory")?;
            info!(removed, "removed previously generated files");
        }

        let report = generator
            .write(&config.output_dir, &outcome.items)
            .context("Failed to write generated files")?;

        summary::print_export(ctx.output.as_ref(), &outcome, &report, &config.output_dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use std::path::Path;

    fn options() -> ExportOptions {
        ExportOptions {
            output: Some(PathBuf::from("/out")),
            ..Default::default()
        }
    }

    #[test]
    fn test_export_from_snapshot_writes_modules_and_imports() {
        let (ctx, fs, output) = test_support::context();

        ExportCommand::execute(&ctx, &test_support::snapshot_options(), &options()).unwrap();

        assert!(fs.has_file(Path::new("/out/main.tf")));
        assert!(fs.has_file(Path::new("/out/providers.tf")));
        assert!(fs.has_file(Path::new("/out/criblio_source/main.tf")));

        let imports = fs.get_file_contents(Path::new("/out/imports.tf")).unwrap();
        assert!(imports.contains("to = module.criblio_source.criblio_source.source_default_in_syslog"));

        let source = fs
            .get_file_contents(Path::new("/out/criblio_source/main.tf"))
            .unwrap();
        assert!(source.contains("input_syslog = {"));
        assert!(!source.contains("in_cribl"));

        let text = output.to_text();
        assert!(text.contains("oneOf type unsupported by provider: cribl"));
    }

    #[test]
    fn test_export_is_repeatable() {
        let (ctx, fs, _) = test_support::context();
        ExportCommand::execute(&ctx, &test_support::snapshot_options(), &options()).unwrap();
        let first: Vec<_> = fs
            .list_files()
            .into_iter()
            .map(|p| (p.clone(), fs.get_file_contents(&p)))
            .collect();

        let clean = ExportOptions {
            clean: true,
            ..options()
        };
        ExportCommand::execute(&ctx, &test_support::snapshot_options(), &clean).unwrap();
        let second: Vec<_> = fs
            .list_files()
            .into_iter()
            .map(|p| (p.clone(), fs.get_file_contents(&p)))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_connection_is_an_error() {
        let (ctx, _, _) = test_support::context();
        let result = ExportCommand::execute(&ctx, &CommandOptions::default(), &options());
        assert!(result.is_err());
    }
}
