//! Discovery engine
//!
//! Enumerates scopes, then calls each type's list method once per scoping
//! context to count what exists. Failures stay scoped to their type.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::catalog;
use super::client::{response_items, ApiClient, ParamMap};
use super::error::{sanitize_message, ExportError, ExportResult, SkipReason};
use super::registry::{RegistryEntry, ScopeKind};

/// Request fields discovery knows how to populate
const SCOPE_FIELDS: &[&str] = &["group_id", "lake_id"];

/// A group/fleet returned by the scope listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeInfo {
    pub id: String,
    pub label: Option<String>,
    pub product: String,
}

impl ScopeInfo {
    pub fn new(id: &str, product: &str) -> Self {
        Self {
            id: id.to_string(),
            label: None,
            product: product.to_string(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

/// Optional allow-list of scopes, matched against id or label
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    allow: Vec<String>,
}

impl ScopeFilter {
    /// A filter that admits every scope
    pub fn all() -> Self {
        Self::default()
    }

    pub fn allow(scopes: &[String]) -> Self {
        Self {
            allow: scopes.to_vec(),
        }
    }

    pub fn matches(&self, scope: &ScopeInfo) -> bool {
        self.allow.is_empty()
            || self
                .allow
                .iter()
                .any(|a| *a == scope.id || scope.label.as_deref() == Some(a.as_str()))
    }
}

/// Outcome of discovering one type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DiscoveryStatus {
    Listed,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryResult {
    pub type_name: String,
    pub count: usize,
    /// Count per scope id (or lake id)
    pub per_scope: BTreeMap<String, usize>,
    pub status: DiscoveryStatus,
    /// List failures for individual contexts (`group=prod`) of a type that
    /// was otherwise listed
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
    #[serde(skip)]
    pub skip: Option<SkipReason>,
}

impl DiscoveryResult {
    fn listed(type_name: &str, per_scope: BTreeMap<String, usize>) -> Self {
        Self {
            type_name: type_name.to_string(),
            count: per_scope.values().sum(),
            per_scope,
            status: DiscoveryStatus::Listed,
            failures: BTreeMap::new(),
            skip: None,
        }
    }

    fn with_failures(mut self, failures: BTreeMap<String, String>) -> Self {
        self.failures = failures;
        self
    }

    fn skipped(type_name: &str, reason: SkipReason) -> Self {
        let status = if reason.is_informational() {
            DiscoveryStatus::Skipped(reason.to_string())
        } else {
            DiscoveryStatus::Failed(reason.to_string())
        };
        Self {
            type_name: type_name.to_string(),
            count: 0,
            per_scope: BTreeMap::new(),
            status,
            failures: BTreeMap::new(),
            skip: Some(reason),
        }
    }

    /// Whether the export pipeline should list and convert this type.
    ///
    /// Types that need a parent context are listed by the pipeline through
    /// their parent, so they are exported despite not being counted here.
    pub fn is_exportable(&self) -> bool {
        match (&self.status, &self.skip) {
            (DiscoveryStatus::Listed, _) => self.count > 0,
            (_, Some(SkipReason::NeedsParentContext(_))) => true,
            _ => false,
        }
    }
}

pub struct DiscoveryEngine {
    client: Arc<dyn ApiClient>,
    products: Vec<String>,
    lakes: Vec<String>,
}

impl DiscoveryEngine {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            products: vec!["stream".to_string(), "edge".to_string()],
            lakes: vec!["default".to_string()],
        }
    }

    pub fn with_products(mut self, products: Vec<String>) -> Self {
        self.products = products;
        self
    }

    pub fn with_lakes(mut self, lakes: Vec<String>) -> Self {
        self.lakes = lakes;
        self
    }

    /// List groups/fleets for every configured product.
    ///
    /// A product whose listing fails is skipped; the call only errors when no
    /// product could be listed at all.
    pub fn list_scopes(&self, filter: &ScopeFilter) -> ExportResult<Vec<ScopeInfo>> {
        let mut scopes = Vec::new();
        let mut failures = Vec::new();

        for product in &self.products {
            let mut params = ParamMap::new();
            params.insert("product".to_string(), product.clone());

            match self
                .client
                .call(catalog::SCOPE_SERVICE, catalog::SCOPE_LIST_METHOD, &params)
            {
                Ok(body) => {
                    for item in response_items(&body) {
                        let id = match item.get("id").and_then(|v| v.as_str()) {
                            Some(id) if !id.is_empty() => id,
                            _ => continue,
                        };
                        let mut scope = ScopeInfo::new(id, product);
                        if let Some(label) = item
                            .get("name")
                            .or_else(|| item.get("description"))
                            .and_then(|v| v.as_str())
                        {
                            scope = scope.with_label(label);
                        }
                        if filter.matches(&scope) {
                            scopes.push(scope);
                        }
                    }
                }
                Err(err) => {
                    warn!(product = %product, error = %err, "scope listing failed");
                    failures.push(format!("{}: {}", product, err));
                }
            }
        }

        if !failures.is_empty() && failures.len() == self.products.len() {
            return Err(ExportError::Api {
                type_name: catalog::SCOPE_TYPE.to_string(),
                message: sanitize_message(&failures.join("; ")),
            });
        }

        Ok(scopes)
    }

    /// Count resources of every entry across the given scopes.
    ///
    /// Every entry yields exactly one result, in entry order.
    pub fn discover(&self, entries: &[RegistryEntry], scopes: &[ScopeInfo]) -> Vec<DiscoveryResult> {
        entries
            .iter()
            .map(|entry| self.discover_type(entry, scopes))
            .collect()
    }

    fn discover_type(&self, entry: &RegistryEntry, scopes: &[ScopeInfo]) -> DiscoveryResult {
        if entry.scope == ScopeKind::Scope {
            let mut per_product = BTreeMap::new();
            for scope in scopes {
                *per_product.entry(scope.product.clone()).or_insert(0) += 1;
            }
            return DiscoveryResult::listed(&entry.type_name, per_product);
        }

        let list_method = match &entry.list_method {
            Some(method) => method,
            None => return DiscoveryResult::skipped(&entry.type_name, SkipReason::NotListable),
        };

        let shape = match self.client.request_shape(&entry.service, list_method) {
            Some(shape) => shape,
            None => {
                return DiscoveryResult::skipped(
                    &entry.type_name,
                    SkipReason::ListFailed(format!(
                        "method {}.{} not found",
                        entry.service, list_method
                    )),
                )
            }
        };

        if let Some(field) = shape
            .fields
            .iter()
            .find(|f| f.required && !SCOPE_FIELDS.contains(&f.name.as_str()))
        {
            debug!(type_name = %entry.type_name, field = %field.name, "list needs parent context");
            return DiscoveryResult::skipped(
                &entry.type_name,
                SkipReason::NeedsParentContext(field.name.clone()),
            );
        }

        let contexts: Vec<ListContext> = if shape.has_field("group_id") {
            scopes
                .iter()
                .map(|s| ListContext::new("group", "group_id", &s.id))
                .collect()
        } else if shape.has_field("lake_id") {
            self.lakes
                .iter()
                .map(|l| ListContext::new("lake", "lake_id", l))
                .collect()
        } else {
            vec![ListContext::global()]
        };

        let mut per_scope = BTreeMap::new();
        let mut failures = BTreeMap::new();

        for context in &contexts {
            match self.client.call(&entry.service, list_method, &context.params) {
                Ok(body) => {
                    per_scope.insert(context.scope.clone(), response_items(&body).len());
                }
                Err(err) => {
                    warn!(type_name = %entry.type_name, context = %context.key, error = %err, "list failed");
                    failures.insert(context.key.clone(), sanitize_message(&err.to_string()));
                }
            }
        }

        if per_scope.is_empty() {
            if let Some(message) = failures.values().next() {
                return DiscoveryResult::skipped(
                    &entry.type_name,
                    SkipReason::ListFailed(message.clone()),
                );
            }
        }

        DiscoveryResult::listed(&entry.type_name, per_scope).with_failures(failures)
    }
}

/// One list call's scoping: the per-scope count key, the identifier-style
/// key failures are reported under, and the request parameters
struct ListContext {
    scope: String,
    key: String,
    params: ParamMap,
}

impl ListContext {
    fn new(kind: &str, param: &str, id: &str) -> Self {
        let mut params = ParamMap::new();
        params.insert(param.to_string(), id.to_string());
        Self {
            scope: id.to_string(),
            key: format!("{}={}", kind, id),
            params,
        }
    }

    fn global() -> Self {
        Self {
            scope: "global".to_string(),
            key: "global".to_string(),
            params: ParamMap::new(),
        }
    }
}
