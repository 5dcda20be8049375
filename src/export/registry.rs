//! Type registry
//!
//! The registry maps each resource type name to its canonical structure, the
//! remote service/method names used to list and fetch it, the identifier
//! format used to re-adopt it, and an optional oneOf descriptor.
//!
//! Entries are derived from the set of constructible resource handlers and
//! merged with a static metadata table. A handler without a metadata row (or a
//! row without a handler) is a hard error, so the registry can never silently
//! omit a type.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::error::{ExportError, ExportResult};
use super::identifiers::IdentifierFormat;
use super::schema::StructureSchema;

/// Enumeration context a type is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Not scoped; listed once
    Global,
    /// Listed per group/fleet
    Group,
    /// Listed per pack inside a group
    Pack,
    /// Listed per lake
    Lake,
    /// The scope type itself; counted from the scope listing
    Scope,
}

/// Describes a discriminated-union ("oneOf") payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OneOfDescriptor {
    /// Model field holding the union payload; empty means the item itself
    pub read_only_field: String,
    pub discriminator_field: String,
    pub block_prefix: String,
    pub block_suffix: String,
    pub fields_to_skip: Vec<String>,
    /// Discriminator values intentionally never emitted
    pub unsupported: Vec<String>,
    pub alias: BTreeMap<String, String>,
    /// Dotted path to a nested discriminator used when the top level is generic
    pub nested_path: Option<String>,
    pub supported_blocks: Vec<String>,
}

impl OneOfDescriptor {
    pub fn new(discriminator_field: &str, block_prefix: &str) -> Self {
        Self {
            discriminator_field: discriminator_field.to_string(),
            block_prefix: block_prefix.to_string(),
            ..Default::default()
        }
    }

    pub fn read_only_field(mut self, field: &str) -> Self {
        self.read_only_field = field.to_string();
        self
    }

    pub fn skip(mut self, fields: &[&str]) -> Self {
        self.fields_to_skip
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn unsupported(mut self, values: &[&str]) -> Self {
        self.unsupported.extend(values.iter().map(|v| v.to_string()));
        self
    }

    pub fn alias(mut self, from: &str, to: &str) -> Self {
        self.alias.insert(from.to_string(), to.to_string());
        self
    }

    pub fn nested(mut self, path: &str) -> Self {
        self.nested_path = Some(path.to_string());
        self
    }

    pub fn blocks(mut self, blocks: &[&str]) -> Self {
        self.supported_blocks
            .extend(blocks.iter().map(|b| b.to_string()));
        self
    }

    pub fn supports_block(&self, name: &str) -> bool {
        self.supported_blocks.iter().any(|b| b == name)
    }
}

/// A constructible resource handler: a type name and the structure it fills
#[derive(Debug, Clone)]
pub struct ResourceHandler {
    pub type_name: String,
    pub structure: StructureSchema,
}

impl ResourceHandler {
    pub fn new(type_name: &str, structure: StructureSchema) -> Self {
        Self {
            type_name: type_name.to_string(),
            structure,
        }
    }
}

/// Static per-type metadata row
#[derive(Debug, Clone)]
pub struct MetadataRow {
    pub type_name: &'static str,
    pub service: &'static str,
    pub list_method: Option<&'static str>,
    pub get_method: Option<&'static str>,
    pub id_format: &'static str,
    pub scope: ScopeKind,
    /// REST route of the list endpoint, relative to the scope prefix
    pub route: Option<&'static str>,
    pub refresh_shape: Option<&'static str>,
    pub lifecycle_ignore: &'static [&'static str],
    pub one_of: Option<fn() -> OneOfDescriptor>,
}

/// Per-type replacement of individual metadata fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOverride {
    pub service: Option<String>,
    pub list_method: Option<String>,
    pub get_method: Option<String>,
    pub id_format: Option<String>,
    pub refresh_shape: Option<String>,
    pub route: Option<String>,
}

/// One registered resource type
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub type_name: String,
    pub structure_name: String,
    pub service: String,
    pub list_method: Option<String>,
    pub get_method: Option<String>,
    pub identifier_format: IdentifierFormat,
    pub scope: ScopeKind,
    pub route: Option<String>,
    /// Response shape the structure is refreshed from, when the naming
    /// convention does not hold
    pub refresh_shape: Option<String>,
    pub lifecycle_ignore: Vec<String>,
    pub one_of: Option<OneOfDescriptor>,
}

impl RegistryEntry {
    /// Response shape used to refresh the structure from a get call
    pub fn refresh_shape(&self) -> Option<String> {
        self.refresh_shape
            .clone()
            .or_else(|| self.get_method.as_ref().map(|m| format!("{}Response", m)))
    }
}

/// Strip the provider prefix from a type name
pub fn short_type_name(type_name: &str) -> &str {
    type_name
        .split_once('_')
        .map(|(_, rest)| rest)
        .unwrap_or(type_name)
}

/// Immutable lookup of registry entries
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
    structures: HashMap<String, StructureSchema>,
}

impl Registry {
    /// Build the registry from constructible handlers and metadata rows.
    ///
    /// Fails if any handler lacks a row, any row lacks a handler, a type is
    /// registered twice, or an override names an unknown type.
    pub fn build(
        handlers: Vec<ResourceHandler>,
        rows: &[MetadataRow],
        overrides: &BTreeMap<String, RegistryOverride>,
    ) -> ExportResult<Self> {
        let mut rows_by_type: HashMap<&str, &MetadataRow> = HashMap::new();
        for row in rows {
            if rows_by_type.insert(row.type_name, row).is_some() {
                return Err(ExportError::Registry(format!(
                    "duplicate metadata row for '{}'",
                    row.type_name
                )));
            }
        }

        let handler_types: HashSet<&str> =
            handlers.iter().map(|h| h.type_name.as_str()).collect();

        let mut orphans: Vec<&str> = rows_by_type
            .keys()
            .filter(|t| !handler_types.contains(*t))
            .copied()
            .collect();
        if !orphans.is_empty() {
            orphans.sort();
            return Err(ExportError::Registry(format!(
                "metadata rows without a handler: {}",
                orphans.join(", ")
            )));
        }

        if let Some(unknown) = overrides.keys().find(|t| !handler_types.contains(t.as_str())) {
            return Err(ExportError::Registry(format!(
                "override for unknown type '{}'",
                unknown
            )));
        }

        let mut entries = Vec::with_capacity(handlers.len());
        let mut structures = HashMap::new();

        for handler in handlers {
            let row = rows_by_type.get(handler.type_name.as_str()).ok_or_else(|| {
                ExportError::Registry(format!(
                    "handler '{}' has no metadata row",
                    handler.type_name
                ))
            })?;
            let ov = overrides.get(&handler.type_name).cloned().unwrap_or_default();

            let id_format = ov.id_format.as_deref().unwrap_or(row.id_format);

            let entry = RegistryEntry {
                type_name: handler.type_name.clone(),
                structure_name: handler.structure.name.clone(),
                service: ov.service.unwrap_or_else(|| row.service.to_string()),
                list_method: ov
                    .list_method
                    .or_else(|| row.list_method.map(str::to_string)),
                get_method: ov.get_method.or_else(|| row.get_method.map(str::to_string)),
                identifier_format: IdentifierFormat::parse(id_format)?,
                scope: row.scope,
                route: ov.route.or_else(|| row.route.map(str::to_string)),
                refresh_shape: ov
                    .refresh_shape
                    .or_else(|| row.refresh_shape.map(str::to_string)),
                lifecycle_ignore: row.lifecycle_ignore.iter().map(|s| s.to_string()).collect(),
                one_of: row.one_of.map(|build| build()),
            };

            if structures
                .insert(handler.structure.name.clone(), handler.structure)
                .is_some()
            {
                return Err(ExportError::Registry(format!(
                    "structure '{}' is claimed by more than one handler",
                    entry.structure_name
                )));
            }
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.type_name.clone(), i))
            .collect();

        Ok(Self {
            entries,
            index,
            structures,
        })
    }

    /// Build the registry from the built-in catalog
    pub fn with_catalog(overrides: &BTreeMap<String, RegistryOverride>) -> ExportResult<Self> {
        Self::build(
            super::catalog::handlers(),
            super::catalog::METADATA,
            overrides,
        )
    }

    pub fn lookup(&self, type_name: &str) -> Option<&RegistryEntry> {
        self.index.get(type_name).map(|&i| &self.entries[i])
    }

    /// All entries, ordered by type name
    pub fn all_entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn structure(&self, name: &str) -> Option<&StructureSchema> {
        self.structures.get(name)
    }

    /// Structure for a registered type
    pub fn structure_for(&self, entry: &RegistryEntry) -> ExportResult<&StructureSchema> {
        self.structure(&entry.structure_name).ok_or_else(|| {
            ExportError::Registry(format!(
                "structure '{}' for '{}' is not registered",
                entry.structure_name, entry.type_name
            ))
        })
    }

    /// Entries restricted to an allow-list of type names (empty keeps all)
    pub fn filtered(&self, types: &[String]) -> ExportResult<Vec<RegistryEntry>> {
        if types.is_empty() {
            return Ok(self.entries.clone());
        }

        for t in types {
            if self.lookup(t).is_none() {
                return Err(ExportError::UnknownType(t.clone()));
            }
        }

        Ok(self
            .entries
            .iter()
            .filter(|e| types.contains(&e.type_name))
            .cloned()
            .collect())
    }
}
