//! Converter
//!
//! Fetches one identified resource through its get method and maps the
//! response onto the type's canonical structure. A handful of types need
//! policy the generic path cannot express; those are named strategies keyed
//! by type name in a [`StrategyTable`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::ListCache;
use super::catalog;
use super::client::{identifier_params, response_item, ApiClient};
use super::error::{sanitize_message, ExportError, ExportResult};
use super::identifiers::{identifier_attribute, DiscoveredIdentifier};
use super::registry::{Registry, RegistryEntry};
use super::schema::StructureSchema;
use super::value::Value;

/// Converted model: canonical structure fields by tag
pub type Model = BTreeMap<String, Value>;

/// Type-specific conversion policy
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionStrategy {
    /// Refresh the structure from a shape the naming convention does not give
    RefreshOverride { shape: String },
    /// The get response omits a sub-structure that a second endpoint returns.
    /// When `required_path` is absent, fetch `field` from `service.method`,
    /// falling back to `fallback` if that also fails.
    FollowUpFetch {
        service: String,
        method: String,
        field: String,
        required_path: String,
        fallback: Value,
    },
    /// Use the cached list item when the get call itself fails
    StoredItemFallback,
}

/// Conversion strategies by type name
#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    strategies: BTreeMap<String, ConversionStrategy>,
}

impl StrategyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, type_name: &str, strategy: ConversionStrategy) -> Self {
        self.strategies.insert(type_name.to_string(), strategy);
        self
    }

    /// Strategies for the built-in catalog
    pub fn builtin() -> Self {
        let (conf_service, conf_method, _) = catalog::PACK_PIPELINE_CONF_METHOD;
        let mut functions = BTreeMap::new();
        functions.insert("functions".to_string(), Value::List(Vec::new()));

        Self::new()
            .with(
                catalog::SCOPE_TYPE,
                ConversionStrategy::RefreshOverride {
                    shape: "ConfigGroup".to_string(),
                },
            )
            .with(
                "criblio_pack_pipeline",
                ConversionStrategy::FollowUpFetch {
                    service: conf_service.to_string(),
                    method: conf_method.to_string(),
                    field: "conf".to_string(),
                    required_path: "conf.functions".to_string(),
                    fallback: Value::Map(functions),
                },
            )
            .with(
                "criblio_pack_destination",
                ConversionStrategy::StoredItemFallback,
            )
    }

    pub fn get(&self, type_name: &str) -> Option<&ConversionStrategy> {
        self.strategies.get(type_name)
    }
}

/// Converts identified resources into canonical models
pub struct Converter {
    client: Arc<dyn ApiClient>,
    registry: Arc<Registry>,
    cache: Arc<ListCache>,
    strategies: StrategyTable,
}

impl Converter {
    pub fn new(client: Arc<dyn ApiClient>, registry: Arc<Registry>, cache: Arc<ListCache>) -> Self {
        Self {
            client,
            registry,
            cache,
            strategies: StrategyTable::builtin(),
        }
    }

    /// Fetch and map one resource.
    ///
    /// Errors always carry the type name and identifiers so the caller can
    /// skip just this item.
    pub fn convert(&self, entry: &RegistryEntry, ids: &DiscoveredIdentifier) -> ExportResult<Model> {
        if let Some(field) = entry.identifier_format.missing_field(ids) {
            return Err(ExportError::MissingIdentifier {
                type_name: entry.type_name.clone(),
                field,
            });
        }

        let structure = self.registry.structure_for(entry)?;
        let get_method = entry
            .get_method
            .as_deref()
            .ok_or_else(|| conversion_error(entry, ids, "type has no get method"))?;
        let strategy = self.strategies.get(&entry.type_name);

        let params = identifier_params(ids);
        let mut model = match self.client.call(&entry.service, get_method, &params) {
            Ok(body) => self.map_response(entry, structure, strategy, ids, &body)?,
            Err(err) => match strategy {
                Some(ConversionStrategy::StoredItemFallback) => {
                    debug!(type_name = %entry.type_name, ids = %ids, "get failed, using stored list item");
                    self.from_cache(entry, structure, ids)
                        .ok_or_else(|| conversion_error(entry, ids, &err.to_string()))?
                }
                _ => return Err(conversion_error(entry, ids, &err.to_string())),
            },
        };

        inject_identifiers(&mut model, ids);

        if let Some(ConversionStrategy::FollowUpFetch {
            service,
            method,
            field,
            required_path,
            fallback,
        }) = strategy
        {
            self.follow_up(&mut model, ids, service, method, field, required_path, fallback);
        }

        Ok(model)
    }

    fn map_response(
        &self,
        entry: &RegistryEntry,
        structure: &StructureSchema,
        strategy: Option<&ConversionStrategy>,
        ids: &DiscoveredIdentifier,
        body: &serde_json::Value,
    ) -> ExportResult<Model> {
        let item = response_item(body)
            .ok_or_else(|| conversion_error(entry, ids, "get response holds no item"))?;

        let shape = refresh_shape(entry, strategy)
            .ok_or_else(|| conversion_error(entry, ids, "no refresh shape"))?;

        match structure.refresh(&shape, &item) {
            Ok(model) => Ok(model),
            Err(err) => match self.from_cache(entry, structure, ids) {
                Some(model) => {
                    debug!(type_name = %entry.type_name, ids = %ids, error = %err, "rebuilt model from list item");
                    Ok(model)
                }
                None => Err(conversion_error(entry, ids, &err.to_string())),
            },
        }
    }

    fn from_cache(
        &self,
        entry: &RegistryEntry,
        structure: &StructureSchema,
        ids: &DiscoveredIdentifier,
    ) -> Option<Model> {
        let raw = self.cache.get(&entry.type_name, ids)?;
        structure.refresh_lenient(&raw).ok()
    }

    #[allow(clippy::too_many_arguments)]
    fn follow_up(
        &self,
        model: &mut Model,
        ids: &DiscoveredIdentifier,
        service: &str,
        method: &str,
        field: &str,
        required_path: &str,
        fallback: &Value,
    ) {
        if has_path(model, required_path) {
            return;
        }

        match self.client.call(service, method, &identifier_params(ids)) {
            Ok(body) => {
                if let Some(item) = response_item(&body) {
                    model.insert(field.to_string(), Value::from_json(&item));
                }
            }
            Err(err) => {
                warn!(ids = %ids, method, error = %err, "follow-up fetch failed");
            }
        }

        if !has_path(model, required_path) {
            model.insert(field.to_string(), fallback.clone());
        }
    }
}

fn refresh_shape(entry: &RegistryEntry, strategy: Option<&ConversionStrategy>) -> Option<String> {
    if let Some(shape) = &entry.refresh_shape {
        return Some(shape.clone());
    }
    if let Some(ConversionStrategy::RefreshOverride { shape }) = strategy {
        return Some(shape.clone());
    }
    entry.refresh_shape()
}

/// Set identifier attributes the response did not echo back
fn inject_identifiers(model: &mut Model, ids: &DiscoveredIdentifier) {
    for (key, value) in ids.iter() {
        let slot = model.entry(identifier_attribute(key)).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::String(value.clone());
        }
    }
}

fn has_path(model: &Model, path: &str) -> bool {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    match (model.get(head), rest) {
        (None, _) | (Some(Value::Null), _) => false,
        (Some(_), None) => true,
        (Some(value), Some(rest)) => value.get_path(rest).map(|v| !v.is_null()).unwrap_or(false),
    }
}

fn conversion_error(entry: &RegistryEntry, ids: &DiscoveredIdentifier, message: &str) -> ExportError {
    ExportError::Conversion {
        type_name: entry.type_name.clone(),
        identifiers: ids.key(),
        message: sanitize_message(message),
    }
}
