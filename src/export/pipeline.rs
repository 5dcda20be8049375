//! Export pipeline
//!
//! For every exportable type: list concrete identifiers, then convert,
//! resolve, repair, filter and name each item on a bounded pool of blocking
//! workers. Results land in shared accumulators and are fully sorted once
//! all work is done, so output order never depends on completion order.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use super::cache::ListCache;
use super::catalog;
use super::client::{identifier_params, response_items, ApiClient};
use super::converter::Converter;
use super::discovery::{DiscoveryResult, ScopeInfo};
use super::error::{sanitize_message, SkipReason};
use super::identifiers::{identifier_attribute, DiscoveredIdentifier};
use super::naming::stable_name;
use super::oneof;
use super::registry::{Registry, RegistryEntry, ScopeKind};
use super::secrets::extract_secrets;
use super::skip::SkipRules;
use super::value::Value;

pub const DEFAULT_PARALLELISM: usize = 4;

/// One resource ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedItem {
    pub type_name: String,
    pub name: String,
    #[serde(skip)]
    pub value: Value,
    /// Identifier string used by the re-adoption directive
    pub readoption_key: String,
    /// Group or lake the item belongs to
    pub scope_id: Option<String>,
    pub lifecycle_ignore: Vec<String>,
    /// Dotted paths rendered even when they hold an empty list
    pub keep_empty: Vec<String>,
    pub secret_vars: Vec<String>,
}

/// A type or item that produced no output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub type_name: String,
    pub identifiers: Option<String>,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: SkipReason,
}

fn serialize_reason<S: serde::Serializer>(reason: &SkipReason, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&reason.to_string())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportOutcome {
    pub items: Vec<ExportedItem>,
    /// Types that contributed nothing
    pub list_skipped: Vec<Skipped>,
    /// Individual items that were skipped
    pub convert_skipped: Vec<Skipped>,
}

impl ExportOutcome {
    /// Exported item count per type
    pub fn counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.type_name.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// How a type's identifiers are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStrategy {
    /// The scope type itself: one item per listed scope
    ScopeIdentities,
    /// One list call per group
    ScopeItems,
    /// List packs per group, then children per pack
    PackChildren,
    /// One list call per lake
    LakeItems,
    /// One unscoped list call
    Global,
}

impl ListingStrategy {
    pub fn for_entry(entry: &RegistryEntry) -> Self {
        match entry.scope {
            ScopeKind::Scope => ListingStrategy::ScopeIdentities,
            ScopeKind::Group => ListingStrategy::ScopeItems,
            ScopeKind::Pack => ListingStrategy::PackChildren,
            ScopeKind::Lake => ListingStrategy::LakeItems,
            ScopeKind::Global => ListingStrategy::Global,
        }
    }
}

/// Identifiers found by listing, plus the contexts whose list call failed
/// while others succeeded
#[derive(Debug, Default)]
struct Listing {
    identifiers: Vec<DiscoveredIdentifier>,
    failures: Vec<(DiscoveredIdentifier, SkipReason)>,
}

/// Enumerates identifiers and captures raw list items into the cache
struct Lister {
    client: Arc<dyn ApiClient>,
    registry: Arc<Registry>,
    cache: Arc<ListCache>,
    skip_rules: Arc<SkipRules>,
    lakes: Vec<String>,
}

impl Lister {
    fn list(&self, entry: &RegistryEntry, scopes: &[ScopeInfo]) -> Result<Listing, SkipReason> {
        let mut failures = Vec::new();
        let contexts: Vec<DiscoveredIdentifier> = match ListingStrategy::for_entry(entry) {
            ListingStrategy::ScopeIdentities => {
                return Ok(Listing {
                    identifiers: scopes
                        .iter()
                        .map(|s| {
                            DiscoveredIdentifier::new()
                                .with("id", s.id.as_str())
                                .with("product", s.product.as_str())
                        })
                        .collect(),
                    failures,
                });
            }
            ListingStrategy::ScopeItems => scopes
                .iter()
                .map(|s| DiscoveredIdentifier::new().with("group", s.id.as_str()))
                .collect(),
            ListingStrategy::PackChildren => {
                let packs = self.pack_contexts(scopes)?;
                failures = packs.failures;
                packs.identifiers
            }
            ListingStrategy::LakeItems => self
                .lakes
                .iter()
                .map(|l| DiscoveredIdentifier::new().with("lake", l.as_str()))
                .collect(),
            ListingStrategy::Global => vec![DiscoveredIdentifier::new()],
        };

        let list_method = entry.list_method.as_deref().ok_or(SkipReason::NotListable)?;
        let mut listing = self.list_in(entry, list_method, &contexts, true)?;
        failures.append(&mut listing.failures);
        listing.failures = failures;
        Ok(listing)
    }

    /// `(group, pack)` contexts for pack-scoped types
    fn pack_contexts(&self, scopes: &[ScopeInfo]) -> Result<Listing, SkipReason> {
        let pack_entry = self
            .registry
            .lookup(catalog::PACK_TYPE)
            .ok_or_else(|| SkipReason::ListFailed("pack type is not registered".to_string()))?;
        let method = pack_entry
            .list_method
            .as_deref()
            .ok_or_else(|| SkipReason::ListFailed("packs are not listable".to_string()))?;

        let groups: Vec<DiscoveredIdentifier> = scopes
            .iter()
            .map(|s| DiscoveredIdentifier::new().with("group", s.id.as_str()))
            .collect();

        let packs = self.list_in(pack_entry, method, &groups, false)?;
        let identifiers = packs
            .identifiers
            .into_iter()
            .filter(|ids| self.skip_rules.check(catalog::PACK_TYPE, ids).is_none())
            .filter_map(|ids| {
                let group = ids.get("group")?.to_string();
                let pack = ids.get("id")?.to_string();
                Some(DiscoveredIdentifier::new().with("group", group).with("pack", pack))
            })
            .collect();
        Ok(Listing {
            identifiers,
            failures: packs.failures,
        })
    }

    /// Call the list method once per context; each item's id is added to
    /// its context to form the item's identifiers.
    ///
    /// Fails as a whole only when every context fails.
    fn list_in(
        &self,
        entry: &RegistryEntry,
        method: &str,
        contexts: &[DiscoveredIdentifier],
        capture: bool,
    ) -> Result<Listing, SkipReason> {
        let mut found = Vec::new();
        let mut failures = Vec::new();

        for context in contexts {
            let body = match self
                .client
                .call(&entry.service, method, &identifier_params(context))
            {
                Ok(body) => body,
                Err(err) => {
                    warn!(type_name = %entry.type_name, context = %context, error = %err, "list failed");
                    let reason = SkipReason::ListFailed(sanitize_message(&err.to_string()));
                    failures.push((context.clone(), reason));
                    continue;
                }
            };

            for item in response_items(&body) {
                let id = match item.get("id").and_then(|v| v.as_str()) {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => continue,
                };
                let ids = context.clone().with("id", id);
                if capture {
                    self.cache.store(&entry.type_name, &ids, item);
                }
                found.push(ids);
            }
        }

        if !failures.is_empty() && failures.len() == contexts.len() {
            return Err(failures.swap_remove(0).1);
        }
        Ok(Listing {
            identifiers: found,
            failures,
        })
    }
}

/// Per-item conversion through output-ready fields
struct ItemWorker {
    registry: Arc<Registry>,
    converter: Converter,
    skip_rules: Arc<SkipRules>,
}

impl ItemWorker {
    fn process(&self, entry: &RegistryEntry, ids: &DiscoveredIdentifier) -> Result<ExportedItem, SkipReason> {
        if let Some(reason) = self.skip_rules.check(&entry.type_name, ids) {
            return Err(reason);
        }

        let structure = self
            .registry
            .structure_for(entry)
            .map_err(|e| SkipReason::from(&e))?;
        let model = self
            .converter
            .convert(entry, ids)
            .map_err(|e| SkipReason::from(&e))?;

        let mut fields = match &entry.one_of {
            Some(descriptor) => {
                let block = oneof::resolve(&model, descriptor)
                    .map_err(|e| SkipReason::from(&e.into_export_error(&entry.type_name, ids)))?;

                let mut fields: BTreeMap<String, Value> = ids
                    .iter()
                    .map(|(key, _)| identifier_attribute(key))
                    .filter_map(|attr| model.get(&attr).cloned().map(|v| (attr, v)))
                    .collect();
                fields.insert(block.name, block.value);
                fields
            }
            None => model,
        };

        let mut recognized: HashSet<String> =
            ids.iter().map(|(key, _)| identifier_attribute(key)).collect();
        if let Some(descriptor) = &entry.one_of {
            recognized.extend(descriptor.supported_blocks.iter().cloned());
        }
        if !structure.is_open() {
            fields.retain(|k, _| structure.recognizes(k) || recognized.contains(k));
        }

        let mut value = Value::Map(fields);
        let mut keep_empty = structure.always_present_fields().to_vec();
        for repair in catalog::repairs_for(&entry.type_name) {
            keep_empty.push(repair.path.to_string());
            let missing = value.get_path(repair.path).map(Value::is_null).unwrap_or(true);
            if missing && !value.set_path(repair.path, repair.placeholder.to_value()) {
                debug!(type_name = %entry.type_name, path = repair.path, "repair path blocked");
            }
        }

        let name = stable_name(&entry.type_name, ids);
        let secret_vars = extract_secrets(&mut value, &name);

        let readoption_key = entry
            .identifier_format
            .render(&entry.type_name, ids)
            .map_err(|e| SkipReason::from(&e))?;

        Ok(ExportedItem {
            type_name: entry.type_name.clone(),
            name,
            value,
            readoption_key,
            scope_id: ids.scope().map(str::to_string),
            lifecycle_ignore: entry.lifecycle_ignore.clone(),
            keep_empty,
            secret_vars,
        })
    }
}

pub struct ExportPipeline {
    registry: Arc<Registry>,
    lister: Arc<Lister>,
    worker: Arc<ItemWorker>,
    parallelism: usize,
}

impl ExportPipeline {
    pub fn new(client: Arc<dyn ApiClient>, registry: Arc<Registry>) -> Self {
        Self::with_options(client, registry, SkipRules::new(), vec!["default".to_string()])
    }

    pub fn with_options(
        client: Arc<dyn ApiClient>,
        registry: Arc<Registry>,
        skip_rules: SkipRules,
        lakes: Vec<String>,
    ) -> Self {
        let cache = Arc::new(ListCache::new());
        let skip_rules = Arc::new(skip_rules);

        let lister = Lister {
            client: client.clone(),
            registry: registry.clone(),
            cache: cache.clone(),
            skip_rules: skip_rules.clone(),
            lakes,
        };
        let worker = ItemWorker {
            registry: registry.clone(),
            converter: Converter::new(client, registry.clone(), cache),
            skip_rules,
        };

        Self {
            registry,
            lister: Arc::new(lister),
            worker: Arc::new(worker),
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Export every type whose discovery result says it is exportable.
    ///
    /// Never fails as a whole: every failure is recorded against its type or
    /// item in the outcome.
    pub async fn export(&self, discovery: &[DiscoveryResult], scopes: &[ScopeInfo]) -> ExportOutcome {
        let items = Arc::new(Mutex::new(Vec::new()));
        let convert_skipped = Arc::new(Mutex::new(Vec::new()));
        let mut list_skipped = Vec::new();
        let scopes = Arc::new(scopes.to_vec());

        for result in discovery {
            let entry = match self.registry.lookup(&result.type_name) {
                Some(entry) => entry.clone(),
                None => continue,
            };

            if !result.is_exportable() {
                let reason = result.skip.clone().unwrap_or(SkipReason::NoIdentifiers);
                list_skipped.push(Skipped {
                    type_name: entry.type_name.clone(),
                    identifiers: None,
                    reason,
                });
                for (context, message) in &result.failures {
                    list_skipped.push(Skipped {
                        type_name: entry.type_name.clone(),
                        identifiers: Some(context.clone()),
                        reason: SkipReason::ListFailed(message.clone()),
                    });
                }
                continue;
            }

            let listed = {
                let lister = self.lister.clone();
                let entry = entry.clone();
                let scopes = scopes.clone();
                tokio::task::spawn_blocking(move || lister.list(&entry, &scopes))
                    .await
                    .unwrap_or_else(|e| Err(SkipReason::ListFailed(format!("listing panicked: {}", e))))
            };

            let identifiers = match listed {
                Ok(listing) => {
                    for (context, reason) in listing.failures {
                        list_skipped.push(Skipped {
                            type_name: entry.type_name.clone(),
                            identifiers: Some(context.key()),
                            reason,
                        });
                    }
                    if listing.identifiers.is_empty() {
                        list_skipped.push(Skipped {
                            type_name: entry.type_name.clone(),
                            identifiers: None,
                            reason: SkipReason::NoIdentifiers,
                        });
                        continue;
                    }
                    listing.identifiers
                }
                Err(reason) => {
                    list_skipped.push(Skipped {
                        type_name: entry.type_name.clone(),
                        identifiers: None,
                        reason,
                    });
                    continue;
                }
            };

            info!(type_name = %entry.type_name, count = identifiers.len(), "converting");
            self.convert_all(&entry, identifiers, &items, &convert_skipped)
                .await;
        }

        let mut items = take(&items);
        items.sort_by(|a, b| {
            (&a.type_name, &a.name, &a.readoption_key).cmp(&(&b.type_name, &b.name, &b.readoption_key))
        });
        let items = dedup_by_readoption_key(items);

        let mut convert_skipped = take(&convert_skipped);
        convert_skipped.sort_by(|a, b| {
            (&a.type_name, &a.identifiers).cmp(&(&b.type_name, &b.identifiers))
        });
        list_skipped.sort_by(|a, b| {
            (&a.type_name, &a.identifiers).cmp(&(&b.type_name, &b.identifiers))
        });

        ExportOutcome {
            items,
            list_skipped,
            convert_skipped,
        }
    }

    async fn convert_all(
        &self,
        entry: &RegistryEntry,
        identifiers: Vec<DiscoveredIdentifier>,
        items: &Arc<Mutex<Vec<ExportedItem>>>,
        skipped: &Arc<Mutex<Vec<Skipped>>>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let entry = Arc::new(entry.clone());
        let mut handles = Vec::new();

        for ids in identifiers {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let worker = self.worker.clone();
            let entry = entry.clone();
            let items = items.clone();
            let skipped = skipped.clone();

            let key = ids.key();
            let task_key = key.clone();
            let handle = tokio::spawn(async move {
                let type_name = entry.type_name.clone();

                let result = tokio::task::spawn_blocking(move || worker.process(&entry, &ids))
                    .await
                    .unwrap_or_else(|e| Err(SkipReason::ConversionFailed(format!("worker panicked: {}", e))));

                drop(permit);

                match result {
                    Ok(item) => {
                        if let Ok(mut items) = items.lock() {
                            items.push(item);
                        }
                    }
                    Err(reason) => {
                        debug!(type_name = %type_name, ids = %key, reason = %reason, "item skipped");
                        if let Ok(mut skipped) = skipped.lock() {
                            skipped.push(Skipped {
                                type_name,
                                identifiers: Some(key),
                                reason,
                            });
                        }
                    }
                }
            });

            handles.push((task_key, handle));
        }

        for (key, handle) in handles {
            if let Err(err) = handle.await {
                warn!(type_name = %entry.type_name, ids = %key, error = %err, "conversion task failed");
                if let Ok(mut skipped) = skipped.lock() {
                    skipped.push(task_failure(&entry.type_name, key, &err));
                }
            }
        }
    }
}

/// Skip record for an item whose conversion task died before reporting
fn task_failure(type_name: &str, key: String, err: &JoinError) -> Skipped {
    Skipped {
        type_name: type_name.to_string(),
        identifiers: Some(key),
        reason: SkipReason::ConversionFailed(format!("task failed: {}", err)),
    }
}

fn take<T>(shared: &Arc<Mutex<Vec<T>>>) -> Vec<T> {
    shared
        .lock()
        .map(|mut v| std::mem::take(&mut *v))
        .unwrap_or_default()
}

/// Keep the first item per (type, re-adoption key)
pub fn dedup_by_readoption_key(items: Vec<ExportedItem>) -> Vec<ExportedItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((item.type_name.clone(), item.readoption_key.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::discovery::{DiscoveryEngine, ScopeFilter};
    use crate::export::snapshot::SnapshotClient;
    use serde_json::json;

    fn snapshot() -> SnapshotClient {
        SnapshotClient::new()
            .method("Groups", "ListConfigGroupByProduct", &["product"])
            .respond(
                "Groups",
                "ListConfigGroupByProduct",
                &[("product", "stream")],
                json!({"items": [{"id": "default"}]}),
            )
            .method("Groups", "GetConfigGroupByProductAndID", &["product", "id"])
            .respond(
                "Groups",
                "GetConfigGroupByProductAndID",
                &[("product", "stream"), ("id", "default")],
                json!({"items": [{"id": "default", "on_prem": true, "estimated_ingest_rate": 1024}]}),
            )
            .method("Inputs", "ListInput", &["group_id"])
            .respond(
                "Inputs",
                "ListInput",
                &[("group_id", "default")],
                json!({"items": [
                    {"id": "input-1", "type": "syslog"},
                    {"id": "in_cribl", "type": "cribl"},
                    {"id": "CriblLogs", "type": "cribl"}
                ]}),
            )
            .method("Inputs", "GetInputByID", &["group_id", "id"])
            .respond(
                "Inputs",
                "GetInputByID",
                &[("group_id", "default"), ("id", "input-1")],
                json!({"items": [{
                    "id": "input-1",
                    "type": "syslog",
                    "port": 514,
                    "status": {"health": "green"},
                    "auth_token": "#12:c2VjcmV0"
                }]}),
            )
            .respond(
                "Inputs",
                "GetInputByID",
                &[("group_id", "default"), ("id", "in_cribl")],
                json!({"items": [{"id": "in_cribl", "type": "cribl"}]}),
            )
            .method("SavedJobs", "ListSavedJob", &["group_id"])
            .respond(
                "SavedJobs",
                "ListSavedJob",
                &[("group_id", "default")],
                json!({"items": [{"id": "job1"}]}),
            )
            .method("SavedJobs", "GetSavedJobByID", &["group_id", "id"])
            .respond(
                "SavedJobs",
                "GetSavedJobByID",
                &[("group_id", "default"), ("id", "job1")],
                json!({"items": [{
                    "id": "job1",
                    "type": "collection",
                    "collector": {"type": "s3", "conf": {"bucket": "archive"}}
                }]}),
            )
            .method("Outputs", "ListOutput", &["group_id"])
            .fail("Outputs", "ListOutput", &[("group_id", "default")], "status 500")
            .method("Pipelines", "ListPipeline", &["group_id"])
            .respond(
                "Pipelines",
                "ListPipeline",
                &[("group_id", "default")],
                json!({"items": [{"id": "main"}, {"id": "passthru"}]}),
            )
            .method("Pipelines", "GetPipelineByID", &["group_id", "id"])
            .respond(
                "Pipelines",
                "GetPipelineByID",
                &[("group_id", "default"), ("id", "main")],
                json!({"items": [{"id": "main", "conf": {"description": "x"}}]}),
            )
            .method("Packs", "ListPacks", &["group_id"])
            .respond(
                "Packs",
                "ListPacks",
                &[("group_id", "default")],
                json!({"items": [{"id": "my_pack"}, {"id": "cribl"}]}),
            )
            .method("Inputs", "ListPackInput", &["group_id", "pack"])
            .respond(
                "Inputs",
                "ListPackInput",
                &[("group_id", "default"), ("pack", "my_pack")],
                json!({"items": [{"id": "pack_in", "type": "http"}]}),
            )
            .method("Inputs", "GetPackInputByID", &["group_id", "pack", "id"])
            .respond(
                "Inputs",
                "GetPackInputByID",
                &[("group_id", "default"), ("pack", "my_pack"), ("id", "pack_in")],
                json!({"items": [{"id": "pack_in", "type": "http", "port": 8088}]}),
            )
    }

    const TYPES: &[&str] = &[
        "criblio_group",
        "criblio_source",
        "criblio_collector",
        "criblio_destination",
        "criblio_pipeline",
        "criblio_pack_source",
        "criblio_commit",
    ];

    async fn run(parallelism: usize) -> ExportOutcome {
        let client: Arc<dyn ApiClient> = Arc::new(snapshot());
        let registry = Arc::new(Registry::with_catalog(&BTreeMap::new()).unwrap());
        let types: Vec<String> = TYPES.iter().map(|t| t.to_string()).collect();
        let entries = registry.filtered(&types).unwrap();

        let engine = DiscoveryEngine::new(client.clone()).with_products(vec!["stream".to_string()]);
        let scopes = engine.list_scopes(&ScopeFilter::all()).unwrap();
        let discovery = engine.discover(&entries, &scopes);

        ExportPipeline::new(client, registry)
            .with_parallelism(parallelism)
            .export(&discovery, &scopes)
            .await
    }

    fn item<'a>(outcome: &'a ExportOutcome, type_name: &str) -> &'a ExportedItem {
        outcome
            .items
            .iter()
            .find(|i| i.type_name == type_name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_simple_resource_scenario() {
        let outcome = run(4).await;
        let source = item(&outcome, "criblio_source");

        assert_eq!(source.name, "source_default_input_1");
        assert_eq!(source.readoption_key, r#"{"group":"default","id":"input-1"}"#);
        assert_eq!(source.scope_id.as_deref(), Some("default"));

        let block = source.value.get("input_syslog").unwrap();
        assert_eq!(block.get("port"), Some(&Value::Number(514.0)));
        assert!(block.get("status").is_none());
        assert!(block.get("type").is_none());
        assert_eq!(source.value.get("group_id"), Some(&Value::from("default")));
    }

    #[tokio::test]
    async fn test_secret_values_become_variables() {
        let outcome = run(2).await;
        let source = item(&outcome, "criblio_source");

        assert_eq!(
            source.secret_vars,
            vec!["source_default_input_1_input_syslog_auth_token"]
        );
        assert_eq!(
            source.value.get_path("input_syslog.auth_token"),
            Some(&Value::VarRef(
                "source_default_input_1_input_syslog_auth_token".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_nested_discriminator_collector() {
        let outcome = run(4).await;
        let collector = item(&outcome, "criblio_collector");
        assert!(collector.value.get("input_collector_s3").is_some());
    }

    #[tokio::test]
    async fn test_skips_are_classified() {
        let outcome = run(4).await;

        let unsupported = outcome
            .convert_skipped
            .iter()
            .find(|s| s.identifiers.as_deref() == Some("group=default,id=in_cribl"))
            .unwrap();
        assert_eq!(unsupported.reason, SkipReason::UnsupportedOneOf("cribl".to_string()));
        assert_eq!(
            unsupported.reason.to_string(),
            "oneOf type unsupported by provider: cribl"
        );

        assert!(outcome.convert_skipped.iter().any(|s| {
            s.identifiers.as_deref() == Some("group=default,id=CriblLogs")
                && matches!(s.reason, SkipReason::BuiltIn(_))
        }));
        assert!(outcome.convert_skipped.iter().any(|s| {
            s.identifiers.as_deref() == Some("group=default,id=passthru")
                && matches!(s.reason, SkipReason::BuiltIn(_))
        }));

        let listed: Vec<(&str, &SkipReason)> = outcome
            .list_skipped
            .iter()
            .map(|s| (s.type_name.as_str(), &s.reason))
            .collect();
        assert!(matches!(listed[0], ("criblio_commit", SkipReason::NotListable)));
        assert!(matches!(listed[1], ("criblio_destination", SkipReason::ListFailed(_))));
    }

    #[tokio::test]
    async fn test_repairs_and_pack_children() {
        let outcome = run(4).await;

        let pipeline = item(&outcome, "criblio_pipeline");
        assert_eq!(
            pipeline.value.get_path("conf.functions"),
            Some(&Value::List(Vec::new()))
        );

        let pack_source = item(&outcome, "criblio_pack_source");
        assert_eq!(pack_source.value.get("pack"), Some(&Value::from("my_pack")));
        assert_eq!(
            pack_source.readoption_key,
            r#"{"group":"default","id":"pack_in","pack":"my_pack"}"#
        );
        assert_eq!(
            outcome
                .items
                .iter()
                .filter(|i| i.type_name == "criblio_pack_source")
                .count(),
            1
        );

        let group = item(&outcome, "criblio_group");
        assert_eq!(group.lifecycle_ignore, vec!["estimated_ingest_rate"]);
        assert_eq!(group.value.get("product"), Some(&Value::from("stream")));
    }

    #[tokio::test]
    async fn test_output_is_independent_of_parallelism() {
        let narrow = run(1).await;
        let wide = run(8).await;

        assert_eq!(narrow.items, wide.items);
        assert_eq!(narrow.convert_skipped, wide.convert_skipped);
        assert_eq!(narrow.list_skipped, wide.list_skipped);
    }

    #[tokio::test]
    async fn test_list_failure_in_one_group_is_reported() {
        let client: Arc<dyn ApiClient> = Arc::new(
            SnapshotClient::new()
                .method("Groups", "ListConfigGroupByProduct", &["product"])
                .respond(
                    "Groups",
                    "ListConfigGroupByProduct",
                    &[("product", "stream")],
                    json!({"items": [{"id": "default"}, {"id": "prod"}]}),
                )
                .method("Inputs", "ListInput", &["group_id"])
                .respond(
                    "Inputs",
                    "ListInput",
                    &[("group_id", "default")],
                    json!({"items": [{"id": "in_http", "type": "http"}]}),
                )
                .fail("Inputs", "ListInput", &[("group_id", "prod")], "status 503")
                .method("Inputs", "GetInputByID", &["group_id", "id"])
                .respond(
                    "Inputs",
                    "GetInputByID",
                    &[("group_id", "default"), ("id", "in_http")],
                    json!({"items": [{"id": "in_http", "type": "http", "port": 8088}]}),
                ),
        );
        let registry = Arc::new(Registry::with_catalog(&BTreeMap::new()).unwrap());
        let entries = registry.filtered(&["criblio_source".to_string()]).unwrap();

        let engine = DiscoveryEngine::new(client.clone()).with_products(vec!["stream".to_string()]);
        let scopes = engine.list_scopes(&ScopeFilter::all()).unwrap();
        let discovery = engine.discover(&entries, &scopes);

        let outcome = ExportPipeline::new(client, registry)
            .export(&discovery, &scopes)
            .await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].name, "source_default_in_http");
        assert_eq!(outcome.list_skipped.len(), 1);

        let failed = &outcome.list_skipped[0];
        assert_eq!(failed.type_name, "criblio_source");
        assert_eq!(failed.identifiers.as_deref(), Some("group=prod"));
        assert!(matches!(&failed.reason, SkipReason::ListFailed(msg) if msg.contains("status 503")));
        assert!(!failed.reason.is_informational());
    }

    #[tokio::test]
    async fn test_failed_task_is_recorded_against_its_item() {
        let err = tokio::spawn(async { Vec::<u8>::new()[0] }).await.unwrap_err();

        let skipped = task_failure("criblio_source", "group=default,id=in_http".to_string(), &err);

        assert_eq!(skipped.type_name, "criblio_source");
        assert_eq!(skipped.identifiers.as_deref(), Some("group=default,id=in_http"));
        assert!(matches!(skipped.reason, SkipReason::ConversionFailed(_)));
        assert!(!skipped.reason.is_informational());
    }

    #[test]
    fn test_dedup_keeps_first() {
        let base = ExportedItem {
            type_name: "criblio_source".to_string(),
            name: "source_a".to_string(),
            value: Value::Map(BTreeMap::new()),
            readoption_key: "k".to_string(),
            scope_id: None,
            lifecycle_ignore: Vec::new(),
            keep_empty: Vec::new(),
            secret_vars: Vec::new(),
        };
        let mut second = base.clone();
        second.name = "source_b".to_string();

        let items = dedup_by_readoption_key(vec![base, second]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "source_a");
    }
}
