//! Canonical structure schemas
//!
//! A [`StructureSchema`] describes a configuration object by the external name
//! tag of each field. Mapping a response onto a structure is one generic pass
//! keyed by those tags, so no type needs hand-written conversion code.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::value::Value;

/// Masked value the API returns in place of stored secrets
const MASKED_VALUE: &str = "*****";

/// Declared kind of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    List,
    Map,
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::List => "list",
            FieldKind::Map => "map",
        }
    }
}

/// One field of a structure, addressed by its external name tag
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub tag: String,
    pub kind: FieldKind,
    pub sensitive: bool,
}

impl FieldSchema {
    pub fn new(tag: &str, kind: FieldKind) -> Self {
        Self {
            tag: tag.to_string(),
            kind,
            sensitive: false,
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Restriction on a structure's discriminator field
#[derive(Debug, Clone)]
pub struct VariantSet {
    pub field: String,
    pub values: Vec<String>,
}

/// Why a response could not be mapped onto a structure
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The structure declares no refresh method for this response shape
    NoRefresher { structure: String, shape: String },
    /// Response body is not an object
    NotAnObject,
    /// Discriminator value is outside the structure's known set
    UnknownVariant { field: String, value: String },
    /// A field's JSON shape does not match its declared kind
    TypeMismatch { field: String, expected: String },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::NoRefresher { structure, shape } => {
                write!(f, "{} cannot be refreshed from {}", structure, shape)
            }
            MappingError::NotAnObject => write!(f, "response body is not an object"),
            MappingError::UnknownVariant { field, value } => {
                write!(f, "unknown variant '{}' for field '{}'", value, field)
            }
            MappingError::TypeMismatch { field, expected } => {
                write!(f, "invalid type: expected {} for field '{}'", expected, field)
            }
        }
    }
}

/// A canonical configuration structure
#[derive(Debug, Clone)]
pub struct StructureSchema {
    pub name: String,
    fields: Vec<FieldSchema>,
    index: HashMap<String, usize>,
    /// Response shapes this structure can be refreshed from
    refreshers: Vec<String>,
    /// Keep fields the schema does not declare
    open: bool,
    variants: Option<VariantSet>,
    /// Fields rendered even when they hold an empty list
    always_present: Vec<String>,
}

impl StructureSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            index: HashMap::new(),
            refreshers: Vec::new(),
            open: false,
            variants: None,
            always_present: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.index.insert(field.tag.clone(), self.fields.len());
        self.fields.push(field);
        self
    }

    pub fn string(self, tag: &str) -> Self {
        self.field(FieldSchema::new(tag, FieldKind::String))
    }

    pub fn number(self, tag: &str) -> Self {
        self.field(FieldSchema::new(tag, FieldKind::Number))
    }

    pub fn boolean(self, tag: &str) -> Self {
        self.field(FieldSchema::new(tag, FieldKind::Bool))
    }

    pub fn list(self, tag: &str) -> Self {
        self.field(FieldSchema::new(tag, FieldKind::List))
    }

    pub fn map(self, tag: &str) -> Self {
        self.field(FieldSchema::new(tag, FieldKind::Map))
    }

    pub fn secret(self, tag: &str) -> Self {
        self.field(FieldSchema::new(tag, FieldKind::String).sensitive())
    }

    pub fn refreshed_from(mut self, shape: &str) -> Self {
        self.refreshers.push(shape.to_string());
        self
    }

    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn variants(mut self, field: &str, values: &[&str]) -> Self {
        self.variants = Some(VariantSet {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn always_present(mut self, tag: &str) -> Self {
        self.always_present.push(tag.to_string());
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn always_present_fields(&self) -> &[String] {
        &self.always_present
    }

    pub fn can_refresh_from(&self, shape: &str) -> bool {
        self.refreshers.iter().any(|r| r == shape)
    }

    /// Whether the structure declares the field
    pub fn recognizes(&self, tag: &str) -> bool {
        self.index.contains_key(tag)
    }

    /// Map a response item onto this structure via the named refresh shape
    pub fn refresh(
        &self,
        shape: &str,
        body: &serde_json::Value,
    ) -> Result<BTreeMap<String, Value>, MappingError> {
        if !self.can_refresh_from(shape) {
            return Err(MappingError::NoRefresher {
                structure: self.name.clone(),
                shape: shape.to_string(),
            });
        }

        if let Some(variants) = &self.variants {
            if let Some(value) = body.get(&variants.field).and_then(|v| v.as_str()) {
                if !variants.values.iter().any(|known| known == value) {
                    return Err(MappingError::UnknownVariant {
                        field: variants.field.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }

        self.map_fields(body)
    }

    /// Best-effort mapping that ignores the variant restriction.
    ///
    /// Used to rebuild a model from a cached list item when the primary
    /// response could not be mapped.
    pub fn refresh_lenient(
        &self,
        body: &serde_json::Value,
    ) -> Result<BTreeMap<String, Value>, MappingError> {
        self.map_fields(body)
    }

    fn map_fields(
        &self,
        body: &serde_json::Value,
    ) -> Result<BTreeMap<String, Value>, MappingError> {
        let object = body.as_object().ok_or(MappingError::NotAnObject)?;
        let mut out = BTreeMap::new();

        for field in &self.fields {
            let value = match object.get(&field.tag) {
                Some(json) => convert_field(field, json)?,
                None => Value::Null,
            };
            out.insert(field.tag.clone(), value);
        }

        if self.open {
            for (key, json) in object {
                if !self.index.contains_key(key) {
                    out.insert(key.clone(), Value::from_json(json));
                }
            }
        }

        Ok(out)
    }
}

fn convert_field(field: &FieldSchema, json: &serde_json::Value) -> Result<Value, MappingError> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    let matches = match field.kind {
        FieldKind::String => json.is_string(),
        FieldKind::Number => json.is_number(),
        FieldKind::Bool => json.is_boolean(),
        FieldKind::List => json.is_array(),
        FieldKind::Map => json.is_object(),
    };

    if !matches {
        return Err(MappingError::TypeMismatch {
            field: field.tag.clone(),
            expected: field.kind.name().to_string(),
        });
    }

    if field.sensitive {
        if let Some(s) = json.as_str() {
            if s == MASKED_VALUE {
                return Ok(Value::Sensitive(String::new()));
            }
            return Ok(Value::Sensitive(s.to_string()));
        }
    }

    Ok(Value::from_json(json))
}
