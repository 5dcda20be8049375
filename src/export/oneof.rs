//! oneOf / discriminator resolution
//!
//! Turns a converted item whose shape is selected by a discriminator field into
//! a single named configuration block. Resolution order:
//!
//! 1. read and unescape the discriminator value
//! 2. reject explicitly unsupported values before anything else
//! 3. apply the alias table, then match against the supported block names
//!    (direct, prefix-stripped, `_target`-suffixed)
//! 4. if that fails and a nested discriminator path is configured, retry with
//!    the nested value
//!
//! Anything that cannot be resolved is reported as [`ResolveError::Unsupported`]
//! so callers skip just that item.

use std::collections::BTreeMap;
use std::fmt;

use super::error::ExportError;
use super::identifiers::DiscoveredIdentifier;
use super::registry::OneOfDescriptor;
use super::value::Value;

/// A resolved configuration block
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBlock {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Discriminator value has no supported block, or there is no
    /// discriminator value to resolve at all
    Unsupported(String),
    /// The union payload field is absent or not an object
    InvalidPayload(String),
}

impl ResolveError {
    /// Scope the error to one item, keeping unsupported values distinguished
    pub fn into_export_error(self, type_name: &str, ids: &DiscoveredIdentifier) -> ExportError {
        match self {
            ResolveError::Unsupported(value) => ExportError::UnsupportedOneOf {
                type_name: type_name.to_string(),
                value,
            },
            other => ExportError::Conversion {
                type_name: type_name.to_string(),
                identifiers: ids.key(),
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Unsupported(value) => {
                write!(f, "oneOf type unsupported by provider: {}", value)
            }
            ResolveError::InvalidPayload(field) => {
                write!(f, "oneOf payload field '{}' is not an object", field)
            }
        }
    }
}

/// Resolve an item's union payload into a named block
pub fn resolve(
    fields: &BTreeMap<String, Value>,
    descriptor: &OneOfDescriptor,
) -> Result<ResolvedBlock, ResolveError> {
    let payload = payload_fields(fields, descriptor)?;

    let raw = payload
        .get(&descriptor.discriminator_field)
        .and_then(discriminator_text);

    let mut name = None;
    if let Some(raw) = &raw {
        check_supported(raw, descriptor)?;
        name = resolve_name(raw, descriptor);
    }

    if name.is_none() {
        if let Some(path) = &descriptor.nested_path {
            if let Some(nested) = nested_discriminator(&payload, path) {
                check_supported(&nested, descriptor)?;
                name = resolve_name(&nested, descriptor);
            }
        }
    }

    let name = match (name, raw) {
        (Some(name), _) => name,
        (None, Some(raw)) => return Err(ResolveError::Unsupported(raw)),
        (None, None) => {
            return Err(ResolveError::Unsupported(format!(
                "no {} value",
                descriptor.discriminator_field
            )))
        }
    };

    let block: BTreeMap<String, Value> = payload
        .into_iter()
        .filter(|(k, _)| {
            *k != descriptor.discriminator_field && !descriptor.fields_to_skip.contains(k)
        })
        .collect();

    Ok(ResolvedBlock {
        name,
        value: Value::Map(block),
    })
}

/// The map holding the union payload
fn payload_fields(
    fields: &BTreeMap<String, Value>,
    descriptor: &OneOfDescriptor,
) -> Result<BTreeMap<String, Value>, ResolveError> {
    if descriptor.read_only_field.is_empty() {
        return Ok(fields.clone());
    }

    match fields.get(&descriptor.read_only_field).map(parse_object) {
        Some(Some(map)) => Ok(map),
        _ => Err(ResolveError::InvalidPayload(
            descriptor.read_only_field.clone(),
        )),
    }
}

/// A sub-object given either as a map or as an embedded JSON document
fn parse_object(value: &Value) -> Option<BTreeMap<String, Value>> {
    match value {
        Value::Map(map) => Some(map.clone()),
        Value::String(text) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) if json.is_object() => Value::from_json(&json).as_map().cloned(),
            _ => None,
        },
        _ => None,
    }
}

fn discriminator_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(unescape(s)).filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Strip transport quoting from a discriminator (`"\"s3\""` becomes `s3`)
pub fn unescape(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return serde_json::from_str::<String>(trimmed)
            .unwrap_or_else(|_| trimmed[1..trimmed.len() - 1].to_string());
    }
    trimmed.to_string()
}

/// Value at a dotted path; intermediate segments may be embedded JSON
fn nested_discriminator(payload: &BTreeMap<String, Value>, path: &str) -> Option<String> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let leaf = segments.pop()?;

    let mut current = payload.clone();
    for segment in segments {
        current = parse_object(current.get(segment)?)?;
    }

    current.get(leaf).and_then(discriminator_text)
}

fn check_supported(raw: &str, descriptor: &OneOfDescriptor) -> Result<(), ResolveError> {
    let normalized = normalize(raw);
    if descriptor
        .unsupported
        .iter()
        .any(|u| u == raw || normalize(u) == normalized)
    {
        return Err(ResolveError::Unsupported(raw.to_string()));
    }
    Ok(())
}

/// Map a discriminator value to a supported block name
fn resolve_name(raw: &str, descriptor: &OneOfDescriptor) -> Option<String> {
    let value = descriptor
        .alias
        .get(raw)
        .map(String::as_str)
        .unwrap_or(raw);
    let normalized = normalize(value);
    if normalized.is_empty() {
        return None;
    }

    let prefix = &descriptor.block_prefix;
    let suffix = &descriptor.block_suffix;

    if descriptor.supported_blocks.is_empty() {
        return Some(format!("{}{}{}", prefix, normalized, suffix));
    }

    let mut candidates = vec![format!("{}{}{}", prefix, normalized, suffix)];
    if !prefix.is_empty() {
        if let Some(stripped) = normalized.strip_prefix(prefix.as_str()) {
            candidates.push(format!("{}{}{}", prefix, stripped, suffix));
        }
    }
    candidates.push(format!("{}{}_target", prefix, normalized));

    candidates
        .into_iter()
        .find(|c| descriptor.supports_block(c))
}

/// Normalize to the output language's snake_case naming
pub fn normalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev_lower = false;

    for c in value.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else {
            out.push('_');
            prev_lower = false;
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::catalog::METADATA;
    use serde_json::json;

    fn item(json: serde_json::Value) -> BTreeMap<String, Value> {
        Value::from_json(&json).as_map().cloned().unwrap()
    }

    fn descriptors() -> Vec<OneOfDescriptor> {
        METADATA
            .iter()
            .filter_map(|row| row.one_of.map(|build| build()))
            .collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("scheduledSearch"), "scheduled_search");
        assert_eq!(normalize("PagerDuty"), "pager_duty");
        assert_eq!(normalize("azure-blob"), "azure_blob");
        assert_eq!(normalize("splunk_hec"), "splunk_hec");
        assert_eq!(normalize("__x..y__"), "x_y");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("\"s3\""), "s3");
        assert_eq!(unescape(" s3 "), "s3");
        assert_eq!(unescape("\"a\\\"b\""), "a\"b");
    }

    #[test]
    fn test_every_supported_block_round_trips() {
        for descriptor in descriptors() {
            for block in &descriptor.supported_blocks {
                let fields = item(json!({
                    descriptor.discriminator_field.clone(): block,
                    "id": "x"
                }));
                let resolved = resolve(&fields, &descriptor).unwrap();
                assert_eq!(&resolved.name, block);
            }
        }
    }

    #[test]
    fn test_every_unsupported_value_is_rejected() {
        for descriptor in descriptors() {
            for value in &descriptor.unsupported {
                let fields = item(json!({
                    descriptor.discriminator_field.clone(): value,
                    "id": "x"
                }));
                let err = resolve(&fields, &descriptor).unwrap_err();
                assert!(
                    matches!(err, ResolveError::Unsupported(_)),
                    "{} should be unsupported",
                    value
                );
            }
        }
    }

    #[test]
    fn test_resolves_prefixless_discriminator_and_builds_sorted_block() {
        let descriptor = OneOfDescriptor::new("type", "input_")
            .skip(&["status"])
            .blocks(&["input_syslog"]);
        let fields = item(json!({
            "type": "syslog",
            "status": {"health": "green"},
            "port": 514,
            "id": "in_syslog"
        }));

        let resolved = resolve(&fields, &descriptor).unwrap();
        assert_eq!(resolved.name, "input_syslog");

        let keys: Vec<&String> = resolved.value.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "port"]);
    }

    #[test]
    fn test_target_suffix_match() {
        let descriptor = OneOfDescriptor::new("type", "").blocks(&["pager_duty_target"]);
        let fields = item(json!({"type": "PagerDuty"}));

        assert_eq!(resolve(&fields, &descriptor).unwrap().name, "pager_duty_target");
    }

    #[test]
    fn test_nested_discriminator_fallback() {
        let descriptor = OneOfDescriptor::new("type", "input_collector_")
            .nested("collector.type")
            .blocks(&["input_collector_s3", "input_collector_rest"]);
        let fields = item(json!({
            "type": "collection",
            "collector": {"type": "s3", "conf": {"bucket": "logs"}}
        }));

        let resolved = resolve(&fields, &descriptor).unwrap();
        assert_eq!(resolved.name, "input_collector_s3");
        assert!(resolved.name.ends_with("s3"));
        assert!(resolved.value.get("collector").is_some());
    }

    #[test]
    fn test_nested_discriminator_inside_embedded_json() {
        let descriptor = OneOfDescriptor::new("type", "input_collector_")
            .nested("collector.type")
            .blocks(&["input_collector_rest"]);
        let fields = item(json!({
            "type": "collection",
            "collector": "{\"type\":\"rest\"}"
        }));

        assert_eq!(resolve(&fields, &descriptor).unwrap().name, "input_collector_rest");
    }

    #[test]
    fn test_unsupported_checked_before_alias() {
        let descriptor = OneOfDescriptor::new("type", "output_")
            .unsupported(&["router"])
            .alias("router", "s3")
            .blocks(&["output_s3"]);
        let fields = item(json!({"type": "router"}));

        assert_eq!(
            resolve(&fields, &descriptor).unwrap_err(),
            ResolveError::Unsupported("router".to_string())
        );
    }

    #[test]
    fn test_alias_resolution() {
        let descriptor = OneOfDescriptor::new("type", "input_")
            .alias("tcpjson", "tcp")
            .blocks(&["input_tcp"]);
        let fields = item(json!({"type": "tcpjson"}));

        assert_eq!(resolve(&fields, &descriptor).unwrap().name, "input_tcp");
    }

    #[test]
    fn test_unknown_value_is_unsupported_not_guessed() {
        let descriptor = OneOfDescriptor::new("type", "input_").blocks(&["input_s3"]);
        let fields = item(json!({"type": "\"brand_new\""}));

        assert_eq!(
            resolve(&fields, &descriptor).unwrap_err(),
            ResolveError::Unsupported("brand_new".to_string())
        );
    }

    #[test]
    fn test_read_only_field_payload() {
        let descriptor = OneOfDescriptor::new("type", "output_")
            .read_only_field("output")
            .blocks(&["output_webhook"]);
        let fields = item(json!({"id": "w", "output": {"type": "webhook", "url": "https://x"}}));

        let resolved = resolve(&fields, &descriptor).unwrap();
        assert_eq!(resolved.name, "output_webhook");
        assert_eq!(resolved.value.get("url"), Some(&Value::from("https://x")));

        let missing = item(json!({"id": "w"}));
        assert!(matches!(
            resolve(&missing, &descriptor),
            Err(ResolveError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_missing_discriminator_is_unsupported() {
        let descriptor = OneOfDescriptor::new("type", "input_").blocks(&["input_s3"]);
        let fields = item(json!({"id": "x"}));

        let err = resolve(&fields, &descriptor).unwrap_err();
        assert_eq!(err, ResolveError::Unsupported("no type value".to_string()));

        let ids = DiscoveredIdentifier::from([("group", "default"), ("id", "x")]);
        assert!(matches!(
            err.into_export_error("criblio_source", &ids),
            ExportError::UnsupportedOneOf { value, .. } if value == "no type value"
        ));
    }
}
