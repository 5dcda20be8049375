//! Discovered identifiers and re-adoption identifier formats

use std::collections::BTreeMap;
use std::fmt;

use super::error::{ExportError, ExportResult};

/// Identifier keys that are sent and stored under an `_id` suffixed name
const SUFFIXED_KEYS: &[&str] = &["group", "lake"];

/// Attribute/request field name carrying an identifier key
pub fn identifier_attribute(key: &str) -> String {
    if SUFFIXED_KEYS.contains(&key) {
        format!("{}_id", key)
    } else {
        key.to_string()
    }
}

/// Ordered identifier-field-name to value map for one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscoveredIdentifier {
    fields: BTreeMap<String, String>,
}

impl DiscoveredIdentifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Non-empty value for a key
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }

    /// Values ordered by key
    pub fn sorted_values(&self) -> Vec<&str> {
        self.fields.values().map(String::as_str).collect()
    }

    /// Scope the resource lives in (group, then lake)
    pub fn scope(&self) -> Option<&str> {
        self.non_empty("group").or_else(|| self.non_empty("lake"))
    }

    /// Stable cache/lookup key
    pub fn key(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for DiscoveredIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for DiscoveredIdentifier {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut ids = DiscoveredIdentifier::new();
        for (k, v) in pairs {
            ids.insert(k, v);
        }
        ids
    }
}

/// How the re-adoption identifier string is built from identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierFormat {
    /// A single field's value
    Bare(String),
    /// Field values joined with commas, in declared order
    Joined(Vec<String>),
    /// A JSON object with alphabetically sorted keys
    Json(Vec<String>),
}

impl IdentifierFormat {
    /// Parse `id`, `group,id`, or `json:group,id`
    pub fn parse(raw: &str) -> ExportResult<Self> {
        let (json, fields) = match raw.strip_prefix("json:") {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let fields: Vec<String> = fields
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        if fields.is_empty() {
            return Err(ExportError::Registry(format!(
                "identifier format '{}' names no fields",
                raw
            )));
        }

        Ok(if json {
            let mut sorted = fields;
            sorted.sort();
            sorted.dedup();
            IdentifierFormat::Json(sorted)
        } else if fields.len() == 1 {
            IdentifierFormat::Bare(fields[0].clone())
        } else {
            IdentifierFormat::Joined(fields)
        })
    }

    /// Identifier keys this format needs
    pub fn required_fields(&self) -> Vec<&str> {
        match self {
            IdentifierFormat::Bare(field) => vec![field.as_str()],
            IdentifierFormat::Joined(fields) | IdentifierFormat::Json(fields) => {
                fields.iter().map(String::as_str).collect()
            }
        }
    }

    /// First required key that is missing or empty
    pub fn missing_field(&self, ids: &DiscoveredIdentifier) -> Option<String> {
        self.required_fields()
            .into_iter()
            .find(|f| ids.non_empty(f).is_none())
            .map(str::to_string)
    }

    /// Render the identifier string used in a re-adoption directive
    pub fn render(&self, type_name: &str, ids: &DiscoveredIdentifier) -> ExportResult<String> {
        if let Some(field) = self.missing_field(ids) {
            return Err(ExportError::MissingIdentifier {
                type_name: type_name.to_string(),
                field,
            });
        }

        let value = |f: &str| ids.get(f).unwrap_or_default().to_string();

        Ok(match self {
            IdentifierFormat::Bare(field) => value(field.as_str()),
            IdentifierFormat::Joined(fields) => fields
                .iter()
                .map(|f| value(f.as_str()))
                .collect::<Vec<_>>()
                .join(","),
            IdentifierFormat::Json(fields) => {
                let object: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|f| (f.clone(), serde_json::Value::String(value(f.as_str()))))
                    .collect();
                serde_json::Value::Object(object).to_string()
            }
        })
    }
}

impl fmt::Display for IdentifierFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierFormat::Bare(field) => write!(f, "{}", field),
            IdentifierFormat::Joined(fields) => write!(f, "{}", fields.join(",")),
            IdentifierFormat::Json(fields) => write!(f, "json:{}", fields.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(
            IdentifierFormat::parse("id").unwrap(),
            IdentifierFormat::Bare("id".to_string())
        );
        assert_eq!(
            IdentifierFormat::parse("group,id").unwrap(),
            IdentifierFormat::Joined(vec!["group".to_string(), "id".to_string()])
        );
        assert_eq!(
            IdentifierFormat::parse("json:pack,id,group").unwrap(),
            IdentifierFormat::Json(vec![
                "group".to_string(),
                "id".to_string(),
                "pack".to_string()
            ])
        );
        assert!(IdentifierFormat::parse("json:").is_err());
    }

    #[test]
    fn test_render_json_sorted_keys() {
        let format = IdentifierFormat::parse("json:id,group").unwrap();
        let ids = DiscoveredIdentifier::from([("id", "input-1"), ("group", "default")]);

        assert_eq!(
            format.render("criblio_source", &ids).unwrap(),
            r#"{"group":"default","id":"input-1"}"#
        );
    }

    #[test]
    fn test_render_joined_and_bare() {
        let ids = DiscoveredIdentifier::from([("group", "default"), ("id", "r1")]);

        let joined = IdentifierFormat::parse("group,id").unwrap();
        assert_eq!(joined.render("t", &ids).unwrap(), "default,r1");

        let bare = IdentifierFormat::parse("id").unwrap();
        assert_eq!(bare.render("t", &ids).unwrap(), "r1");
    }

    #[test]
    fn test_render_requires_non_empty_fields() {
        let format = IdentifierFormat::parse("json:group,id,pack").unwrap();
        let ids = DiscoveredIdentifier::from([("group", "default"), ("id", "p1"), ("pack", "")]);

        let err = format.render("criblio_pack_pipeline", &ids).unwrap_err();
        assert!(matches!(
            err,
            ExportError::MissingIdentifier { ref field, .. } if field == "pack"
        ));
    }

    #[test]
    fn test_identifier_attribute() {
        assert_eq!(identifier_attribute("group"), "group_id");
        assert_eq!(identifier_attribute("lake"), "lake_id");
        assert_eq!(identifier_attribute("pack"), "pack");
        assert_eq!(identifier_attribute("id"), "id");
    }
}
