//! Human-readable reports for the `types`, `discover` and `export` commands

use std::path::Path;

use super::discovery::{DiscoveryResult, DiscoveryStatus, ScopeInfo};
use super::error::SkipReason;
use super::pipeline::{ExportOutcome, Skipped};
use super::registry::RegistryEntry;
use super::writer::WriteReport;
use crate::traits::Output;

/// One line per registered type
pub fn print_registry(output: &dyn Output, entries: &[RegistryEntry]) {
    output.section(&format!("Registered types ({})", entries.len()));

    for entry in entries {
        output.subsection(&entry.type_name);
        output.key_value("Service", &entry.service);
        output.key_value("List", entry.list_method.as_deref().unwrap_or("-"));
        output.key_value("Get", entry.get_method.as_deref().unwrap_or("-"));
        output.key_value("Identifier", &entry.identifier_format.to_string());
        if let Some(one_of) = &entry.one_of {
            output.key_value(
                "oneOf",
                &format!(
                    "{} ({} blocks)",
                    one_of.discriminator_field,
                    one_of.supported_blocks.len()
                ),
            );
        }
    }
}

pub fn print_scopes(output: &dyn Output, scopes: &[ScopeInfo]) {
    output.subsection(&format!("Scopes ({})", scopes.len()));
    for scope in scopes {
        let label = match &scope.label {
            Some(label) if label != &scope.id => format!("{} ({}, {})", scope.id, label, scope.product),
            _ => format!("{} ({})", scope.id, scope.product),
        };
        output.list_item(&label);
    }
}

/// Per-type counts with a per-scope breakdown
pub fn print_discovery(output: &dyn Output, results: &[DiscoveryResult]) {
    output.section("Discovery");

    for result in results {
        match &result.status {
            DiscoveryStatus::Listed => {
                output.status(&result.type_name, true, &format!("{} found", result.count));
                for (scope, count) in &result.per_scope {
                    output.dimmed(&format!("      {}: {}", scope, count));
                }
                for (context, message) in &result.failures {
                    output.status(
                        &format!("{} [{}]", result.type_name, context),
                        false,
                        &SkipReason::ListFailed(message.clone()).to_string(),
                    );
                }
            }
            DiscoveryStatus::Skipped(reason) => {
                output.dimmed(&format!("  - {} {}", result.type_name, reason));
            }
            DiscoveryStatus::Failed(reason) => {
                output.status(&result.type_name, false, reason);
            }
        }
    }

    let total: usize = results.iter().map(|r| r.count).sum();
    let listed = results
        .iter()
        .filter(|r| r.status == DiscoveryStatus::Listed)
        .count();
    output.blank();
    output.key_value_highlight(
        "Total",
        &format!("{} resources across {} types", total, listed),
    );
}

/// Written files, items per type, and every skip with its reason
pub fn print_export(output: &dyn Output, outcome: &ExportOutcome, report: &WriteReport, base_dir: &Path) {
    output.section("Export");
    output.key_value("Output", &base_dir.display().to_string());
    output.key_value("Files", &report.files.len().to_string());
    output.key_value("Modules", &report.modules.len().to_string());
    output.key_value("Import directives", &report.imports.to_string());

    let counts = outcome.counts();
    if !counts.is_empty() {
        output.subsection("Exported");
        for (type_name, count) in &counts {
            output.status(type_name, true, &count.to_string());
        }
    }

    if !outcome.list_skipped.is_empty() {
        output.subsection("Types skipped");
        for skipped in &outcome.list_skipped {
            print_skip(output, skipped);
        }
    }

    if !outcome.convert_skipped.is_empty() {
        output.subsection("Items skipped");
        for skipped in &outcome.convert_skipped {
            print_skip(output, skipped);
        }
    }

    output.blank();
    let failures = outcome
        .list_skipped
        .iter()
        .chain(&outcome.convert_skipped)
        .filter(|s| !s.reason.is_informational())
        .count();
    if failures == 0 {
        output.success(&format!("Exported {} resources", outcome.items.len()));
    } else {
        output.warning(&format!(
            "Exported {} resources, {} could not be exported",
            outcome.items.len(),
            failures
        ));
    }
}

fn print_skip(output: &dyn Output, skipped: &Skipped) {
    let subject = match &skipped.identifiers {
        Some(ids) => format!("{} [{}]", skipped.type_name, ids),
        None => skipped.type_name.clone(),
    };

    if skipped.reason.is_informational() {
        output.dimmed(&format!("  - {}: {}", subject, skipped.reason));
    } else {
        output.status(&subject, false, &skipped.reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::output::OutputMessage;
    use crate::traits::MockOutput;

    #[test]
    fn test_export_summary_lists_every_skip() {
        let output = MockOutput::new();
        let outcome = ExportOutcome {
            items: Vec::new(),
            list_skipped: vec![Skipped {
                type_name: "criblio_commit".to_string(),
                identifiers: None,
                reason: SkipReason::NotListable,
            }],
            convert_skipped: vec![Skipped {
                type_name: "criblio_source".to_string(),
                identifiers: Some("group=default,id=in_cribl".to_string()),
                reason: SkipReason::UnsupportedOneOf("cribl".to_string()),
            }],
        };

        print_export(&output, &outcome, &WriteReport::default(), Path::new("out"));

        assert!(output.contains_message(&OutputMessage::Dimmed(
            "  - criblio_commit: type has no list method".to_string()
        )));
        assert!(output.contains_message(&OutputMessage::Status(
            "criblio_source [group=default,id=in_cribl]".to_string(),
            false,
            "oneOf type unsupported by provider: cribl".to_string()
        )));
        assert!(output
            .to_text()
            .contains("Exported 0 resources, 1 could not be exported"));
    }

    #[test]
    fn test_discovery_totals() {
        let output = MockOutput::new();
        let mut per_scope = std::collections::BTreeMap::new();
        per_scope.insert("default".to_string(), 2);
        let results = vec![DiscoveryResult {
            type_name: "criblio_source".to_string(),
            count: 2,
            per_scope,
            status: DiscoveryStatus::Listed,
            failures: std::collections::BTreeMap::from([(
                "group=prod".to_string(),
                "status 503".to_string(),
            )]),
            skip: None,
        }];

        print_discovery(&output, &results);

        assert!(output.contains_message(&OutputMessage::KeyValue(
            "Total".to_string(),
            "2 resources across 1 types".to_string()
        )));
        assert!(output.contains_message(&OutputMessage::Dimmed("      default: 2".to_string())));
        assert!(output.contains_message(&OutputMessage::Status(
            "criblio_source [group=prod]".to_string(),
            false,
            "list failed: status 503".to_string()
        )));
    }
}
