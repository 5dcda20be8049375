use super::{build_registry, CommandOptions};
use crate::context::Context;
use crate::export::summary;
use anyhow::Result;

pub struct TypesCommand;

impl TypesCommand {
    /// Print every registered resource type
    pub fn execute(ctx: &Context, options: &CommandOptions) -> Result<()> {
        let config = options.resolve_config(ctx)?;
        let registry = build_registry(&config)?;
        let entries = registry.filtered(&config.types)?;

        summary::print_registry(ctx.output.as_ref(), &entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    #[test]
    fn test_lists_requested_types() {
        let (ctx, _, output) = test_support::context();
        let options = CommandOptions {
            types: vec!["criblio_source".to_string()],
            ..Default::default()
        };

        TypesCommand::execute(&ctx, &options).unwrap();

        let text = output.to_text();
        assert!(text.contains("Registered types (1)"));
        assert!(text.contains("criblio_source"));
        assert!(text.contains("Get: GetInputByID"));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let (ctx, _, _) = test_support::context();
        let options = CommandOptions {
            types: vec!["criblio_nope".to_string()],
            ..Default::default()
        };

        assert!(TypesCommand::execute(&ctx, &options).is_err());
    }
}
