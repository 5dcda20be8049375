//! Generator
//!
//! Lays exported items out as one module per type (optionally nested per
//! scope) plus root files. Import directives may only live in the root
//! module, so every directive addresses its item through the module path.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog;
use super::error::{ExportError, ExportResult};
use super::hcl;
use super::naming::{sanitize_identifier, NameAllocator};
use super::pipeline::ExportedItem;
use crate::traits::FileSystem;

/// Directory used for items without a scope in per-scope layout
pub const GLOBAL_SCOPE_DIR: &str = "global";

const GENERATED_EXTENSION: &str = "tf";

/// How modules are arranged under the output directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// `<base>/<type>`
    #[default]
    Flat,
    /// `<base>/<scope>/<type>`
    PerScope,
}

impl FromStr for Layout {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Layout::Flat),
            "per-scope" => Ok(Layout::PerScope),
            other => Err(ExportError::Config(format!(
                "unknown layout '{}' (expected flat or per-scope)",
                other
            ))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Flat => write!(f, "flat"),
            Layout::PerScope => write!(f, "per-scope"),
        }
    }
}

/// Provider source and version constraint pinned in generated files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPin {
    pub source: String,
    pub version: String,
}

impl Default for ProviderPin {
    fn default() -> Self {
        Self {
            source: catalog::PROVIDER_SOURCE.to_string(),
            version: catalog::PROVIDER_VERSION.to_string(),
        }
    }
}

/// A written module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    /// Directory relative to the output root
    pub path: String,
    pub resources: usize,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub modules: Vec<ModuleSummary>,
    pub files: Vec<PathBuf>,
    pub imports: usize,
}

/// Items of one module after dedup and collision resolution
struct Module {
    name: String,
    rel_dir: String,
    items: Vec<ExportedItem>,
    variables: Vec<String>,
}

pub struct Generator<'a> {
    fs: &'a dyn FileSystem,
    layout: Layout,
    provider: ProviderPin,
}

impl<'a> Generator<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self {
            fs,
            layout: Layout::Flat,
            provider: ProviderPin::default(),
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_provider(mut self, provider: ProviderPin) -> Self {
        self.provider = provider;
        self
    }

    /// Remove previously generated files under `base_dir`
    pub fn clean(&self, base_dir: &Path) -> ExportResult<usize> {
        if !self.fs.is_dir(base_dir) {
            return Ok(0);
        }

        let stale: Vec<PathBuf> = self
            .fs
            .walk_files(base_dir)
            .map_err(fs_error)?
            .into_iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(GENERATED_EXTENSION))
            .collect();

        for path in &stale {
            self.fs.remove_file(path).map_err(fs_error)?;
        }
        Ok(stale.len())
    }

    /// Write all modules and root files
    pub fn write(&self, base_dir: &Path, items: &[ExportedItem]) -> ExportResult<WriteReport> {
        let modules = self.plan(items);
        let mut report = WriteReport::default();

        self.fs.create_dir_all(base_dir).map_err(fs_error)?;

        for module in &modules {
            let dir = base_dir.join(&module.rel_dir);
            self.fs.create_dir_all(&dir).map_err(fs_error)?;

            let files = [
                ("main", render_module_main(module)),
                ("versions", self.render_versions()),
                ("variables", render_variables(&module.variables, false)),
                ("outputs", render_outputs(module)),
            ];
            for (stem, content) in files {
                report.files.push(self.write_file(&dir, stem, &content)?);
            }

            debug!(module = %module.name, resources = module.items.len(), "module written");
            report.modules.push(ModuleSummary {
                name: module.name.clone(),
                path: module.rel_dir.clone(),
                resources: module.items.len(),
                variables: module.variables.clone(),
            });
        }

        let imports = render_imports(&modules);
        report.imports = imports.count;

        let root_variables: Vec<String> = modules
            .iter()
            .flat_map(|m| m.variables.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let root_files = [
            ("main", render_root_main(&modules)),
            ("providers", self.render_providers()),
            ("variables", render_variables(&root_variables, true)),
            ("imports", imports.text),
        ];
        for (stem, content) in root_files {
            report.files.push(self.write_file(base_dir, stem, &content)?);
        }

        Ok(report)
    }

    fn write_file(&self, dir: &Path, stem: &str, content: &str) -> ExportResult<PathBuf> {
        let path = dir.join(format!("{}.{}", stem, GENERATED_EXTENSION));
        self.fs.write(&path, content).map_err(fs_error)?;
        Ok(path)
    }

    /// Group items into modules, dedupe, resolve name collisions, prune
    fn plan(&self, items: &[ExportedItem]) -> Vec<Module> {
        let mut sorted: Vec<&ExportedItem> = items.iter().collect();
        sorted.sort_by(|a, b| {
            (&a.type_name, &a.name, &a.readoption_key).cmp(&(&b.type_name, &b.name, &b.readoption_key))
        });

        let mut grouped: BTreeMap<String, Vec<ExportedItem>> = BTreeMap::new();
        for item in sorted {
            grouped
                .entry(self.module_dir(item))
                .or_default()
                .push(item.clone());
        }

        // Secret variables are declared in the root module, so their names
        // must be unique across every module.
        let mut var_names = NameAllocator::new();

        grouped
            .into_iter()
            .map(|(rel_dir, items)| {
                let mut seen = HashSet::new();
                let mut names = NameAllocator::new();
                let mut variables = BTreeSet::new();

                let mut kept: Vec<ExportedItem> = items
                    .into_iter()
                    .filter(|item| seen.insert(item.readoption_key.clone()))
                    .map(|mut item| {
                        let name = names.allocate(&item.name);
                        if name != item.name {
                            rename_item(&mut item, name);
                        }
                        allocate_variables(&mut item, &mut var_names);

                        let keep: HashSet<String> = item.keep_empty.iter().cloned().collect();
                        item.value.prune_nulls();
                        item.value.prune_empty_lists(&keep);

                        variables.extend(item.secret_vars.iter().cloned());
                        item
                    })
                    .collect();
                kept.sort_by(|a, b| a.name.cmp(&b.name));

                Module {
                    name: sanitize_identifier(&rel_dir),
                    rel_dir,
                    items: kept,
                    variables: variables.into_iter().collect(),
                }
            })
            .collect()
    }

    fn module_dir(&self, item: &ExportedItem) -> String {
        match self.layout {
            Layout::Flat => item.type_name.clone(),
            Layout::PerScope => {
                let scope = item
                    .scope_id
                    .as_deref()
                    .map(sanitize_identifier)
                    .unwrap_or_else(|| GLOBAL_SCOPE_DIR.to_string());
                format!("{}/{}", scope, item.type_name)
            }
        }
    }

    fn required_providers(&self) -> String {
        format!(
            "  required_providers {{\n    {} = {{\n      source  = {}\n      version = {}\n    }}\n  }}\n",
            catalog::PROVIDER_NAME,
            hcl::quote(&self.provider.source),
            hcl::quote(&self.provider.version)
        )
    }

    fn render_versions(&self) -> String {
        format!("terraform {{\n{}}}\n", self.required_providers())
    }

    fn render_providers(&self) -> String {
        format!(
            "terraform {{\n{}}}\n\nprovider {} {{\n  server_url   = var.server_url\n  bearer_token = var.bearer_token\n}}\n",
            self.required_providers(),
            hcl::quote(catalog::PROVIDER_NAME)
        )
    }
}

/// Give an item a new name, carrying its variable names along
fn rename_item(item: &mut ExportedItem, name: String) {
    let from = format!("{}_", item.name);
    let to = format!("{}_", name);

    let renames: BTreeMap<String, String> = item
        .secret_vars
        .iter()
        .filter_map(|var| {
            let rest = var.strip_prefix(&from)?;
            Some((var.clone(), format!("{}{}", to, rest)))
        })
        .collect();
    apply_variable_renames(item, &renames);
    item.name = name;
}

/// Reserve the item's variable names run-wide, renumbering any already taken
fn allocate_variables(item: &mut ExportedItem, var_names: &mut NameAllocator) {
    let renames: BTreeMap<String, String> = item
        .secret_vars
        .iter()
        .filter_map(|var| {
            let allocated = var_names.allocate(var);
            (allocated != *var).then(|| (var.clone(), allocated))
        })
        .collect();
    apply_variable_renames(item, &renames);
}

fn apply_variable_renames(item: &mut ExportedItem, renames: &BTreeMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    item.value.rename_var_refs(renames);
    for var in item.secret_vars.iter_mut() {
        if let Some(to) = renames.get(var.as_str()) {
            *var = to.clone();
        }
    }
    item.secret_vars.sort();
}

fn render_module_main(module: &Module) -> String {
    module
        .items
        .iter()
        .map(|item| hcl::resource_block(&item.type_name, &item.name, &item.value, &item.lifecycle_ignore))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_variables(names: &[String], with_connection: bool) -> String {
    let mut blocks = Vec::new();

    if with_connection {
        blocks.push(
            "variable \"server_url\" {\n  type = string\n}\n".to_string(),
        );
        blocks.push(
            "variable \"bearer_token\" {\n  type      = string\n  sensitive = true\n}\n".to_string(),
        );
    }

    for name in names {
        blocks.push(format!(
            "variable {} {{\n  type      = string\n  sensitive = true\n}}\n",
            hcl::quote(name)
        ));
    }

    blocks.join("\n")
}

fn render_outputs(module: &Module) -> String {
    format!(
        "# Outputs for module {} ({} resources)\n",
        module.name,
        module.items.len()
    )
}

fn render_root_main(modules: &[Module]) -> String {
    modules
        .iter()
        .map(|module| {
            let mut block = format!(
                "module {} {{\n  source = {}\n",
                hcl::quote(&module.name),
                hcl::quote(&format!("./{}", module.rel_dir))
            );
            if !module.variables.is_empty() {
                block.push('\n');
                for var in &module.variables {
                    block.push_str(&format!("  {} = var.{}\n", var, var));
                }
            }
            block.push_str("}\n");
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

struct Imports {
    text: String,
    count: usize,
}

/// One directive per item, sorted by type then name, unique per address
fn render_imports(modules: &[Module]) -> Imports {
    let mut directives: Vec<(&str, &str, String, &str)> = Vec::new();
    for module in modules {
        for item in &module.items {
            let address = format!("module.{}.{}.{}", module.name, item.type_name, item.name);
            directives.push((&item.type_name, &item.name, address, &item.readoption_key));
        }
    }
    directives.sort();

    let mut seen = HashSet::new();
    let blocks: Vec<String> = directives
        .into_iter()
        .filter(|(_, _, address, _)| seen.insert(address.clone()))
        .map(|(_, _, address, id)| {
            format!("import {{\n  to = {}\n  id = {}\n}}\n", address, hcl::quote(id))
        })
        .collect();

    Imports {
        count: blocks.len(),
        text: blocks.join("\n"),
    }
}

fn fs_error(err: anyhow::Error) -> ExportError {
    ExportError::FileSystem(format!("{:#}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::value::Value;
    use crate::traits::MockFileSystem;
    use serde_json::json;

    fn item(type_name: &str, name: &str, key: &str, scope: Option<&str>, value: serde_json::Value) -> ExportedItem {
        ExportedItem {
            type_name: type_name.to_string(),
            name: name.to_string(),
            value: Value::from_json(&value),
            readoption_key: key.to_string(),
            scope_id: scope.map(str::to_string),
            lifecycle_ignore: Vec::new(),
            keep_empty: Vec::new(),
            secret_vars: Vec::new(),
        }
    }

    fn read(fs: &MockFileSystem, path: &str) -> String {
        fs.get_file_contents(Path::new(path)).unwrap()
    }

    fn secret_item() -> ExportedItem {
        let mut source = item(
            "criblio_source",
            "source_default_input_1",
            r#"{"group":"default","id":"input-1"}"#,
            Some("default"),
            json!({"id": "input-1", "group_id": "default", "description": null, "tags": []}),
        );
        source.value.set_path(
            "auth_token",
            Value::VarRef("source_default_input_1_auth_token".to_string()),
        );
        source.secret_vars = vec!["source_default_input_1_auth_token".to_string()];
        source
    }

    #[test]
    fn test_flat_layout_files() {
        let fs = MockFileSystem::new();
        let report = Generator::new(&fs)
            .write(Path::new("/out"), &[secret_item()])
            .unwrap();

        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.imports, 1);
        assert_eq!(
            fs.list_files(),
            vec![
                PathBuf::from("/out/criblio_source/main.tf"),
                PathBuf::from("/out/criblio_source/outputs.tf"),
                PathBuf::from("/out/criblio_source/variables.tf"),
                PathBuf::from("/out/criblio_source/versions.tf"),
                PathBuf::from("/out/imports.tf"),
                PathBuf::from("/out/main.tf"),
                PathBuf::from("/out/providers.tf"),
                PathBuf::from("/out/variables.tf"),
            ]
        );

        let main = read(&fs, "/out/criblio_source/main.tf");
        assert_eq!(
            main,
            "resource \"criblio_source\" \"source_default_input_1\" {\n  auth_token = var.source_default_input_1_auth_token\n  group_id = \"default\"\n  id = \"input-1\"\n}\n"
        );

        let imports = read(&fs, "/out/imports.tf");
        assert_eq!(
            imports,
            "import {\n  to = module.criblio_source.criblio_source.source_default_input_1\n  id = \"{\\\"group\\\":\\\"default\\\",\\\"id\\\":\\\"input-1\\\"}\"\n}\n"
        );
    }

    #[test]
    fn test_secret_declared_once_and_wired_through_root() {
        let fs = MockFileSystem::new();
        Generator::new(&fs)
            .write(Path::new("/out"), &[secret_item()])
            .unwrap();

        let variables = read(&fs, "/out/criblio_source/variables.tf");
        assert_eq!(
            variables
                .matches("variable \"source_default_input_1_auth_token\"")
                .count(),
            1
        );
        assert!(variables.contains("sensitive = true"));

        let root_main = read(&fs, "/out/main.tf");
        assert!(root_main.contains("source = \"./criblio_source\""));
        assert!(root_main.contains(
            "source_default_input_1_auth_token = var.source_default_input_1_auth_token"
        ));

        let root_variables = read(&fs, "/out/variables.tf");
        assert!(root_variables.contains("variable \"bearer_token\""));
        assert!(root_variables.contains("variable \"source_default_input_1_auth_token\""));

        let providers = read(&fs, "/out/providers.tf");
        assert!(providers.contains("source  = \"criblio/criblio\""));
        assert!(providers.contains("server_url   = var.server_url"));
    }

    #[test]
    fn test_dedup_and_collisions() {
        let fs = MockFileSystem::new();
        let items = vec![
            item("criblio_pipeline", "pipeline_a", "k1", Some("default"), json!({"id": "a"})),
            item("criblio_pipeline", "pipeline_a", "k1", Some("default"), json!({"id": "dup"})),
            item("criblio_pipeline", "pipeline_a", "k2", Some("default"), json!({"id": "A"})),
        ];

        let report = Generator::new(&fs).write(Path::new("/out"), &items).unwrap();
        assert_eq!(report.modules[0].resources, 2);

        let main = read(&fs, "/out/criblio_pipeline/main.tf");
        assert!(main.contains("\"pipeline_a\" {\n  id = \"a\""));
        assert!(main.contains("\"pipeline_a_2\" {\n  id = \"A\""));
        assert!(!main.contains("dup"));
    }

    #[test]
    fn test_renamed_item_keeps_its_variables() {
        let fs = MockFileSystem::new();
        let first = item("criblio_source", "source_x", "k1", None, json!({"id": "x"}));
        let mut second = secret_item();
        second.name = "source_x".to_string();
        second.readoption_key = "k2".to_string();
        second.value.set_path("auth_token", Value::VarRef("source_x_auth_token".to_string()));
        second.secret_vars = vec!["source_x_auth_token".to_string()];

        let report = Generator::new(&fs)
            .write(Path::new("/out"), &[first, second])
            .unwrap();

        assert_eq!(report.modules[0].variables, vec!["source_x_2_auth_token"]);
        let main = read(&fs, "/out/criblio_source/main.tf");
        assert!(main.contains("auth_token = var.source_x_2_auth_token"));
    }

    #[test]
    fn test_secret_variables_are_unique_across_items() {
        let fs = MockFileSystem::new();
        let mut first = item("criblio_source", "source_default_x", "k1", None, json!({"id": "x"}));
        first.value.set_path("auth_token", Value::VarRef("source_default_x_auth_token".to_string()));
        first.secret_vars = vec!["source_default_x_auth_token".to_string()];

        let mut second = item("criblio_source", "source_default_x_auth", "k2", None, json!({"id": "x_auth"}));
        second.value.set_path("token", Value::VarRef("source_default_x_auth_token".to_string()));
        second.secret_vars = vec!["source_default_x_auth_token".to_string()];

        let report = Generator::new(&fs)
            .write(Path::new("/out"), &[second, first])
            .unwrap();

        assert_eq!(
            report.modules[0].variables,
            vec!["source_default_x_auth_token", "source_default_x_auth_token_2"]
        );

        let main = read(&fs, "/out/criblio_source/main.tf");
        assert!(main.contains("auth_token = var.source_default_x_auth_token\n"));
        assert!(main.contains("  token = var.source_default_x_auth_token_2\n"));

        let root_variables = read(&fs, "/out/variables.tf");
        assert!(root_variables.contains("variable \"source_default_x_auth_token\""));
        assert!(root_variables.contains("variable \"source_default_x_auth_token_2\""));
    }

    #[test]
    fn test_null_and_empty_list_pruning() {
        let fs = MockFileSystem::new();
        let mut routes = item(
            "criblio_routes",
            "routes_default",
            "k",
            Some("default"),
            json!({"id": "default", "routes": [], "comments": [], "groups": null}),
        );
        routes.keep_empty = vec!["routes".to_string()];

        Generator::new(&fs).write(Path::new("/out"), &[routes]).unwrap();

        let main = read(&fs, "/out/criblio_routes/main.tf");
        assert!(main.contains("routes = []"));
        assert!(!main.contains("comments"));
        assert!(!main.contains("groups"));
    }

    #[test]
    fn test_per_scope_layout() {
        let fs = MockFileSystem::new();
        let items = vec![
            item("criblio_source", "source_a", "k1", Some("default"), json!({"id": "a"})),
            item("criblio_notification_target", "notification_target_t", "t", None, json!({"id": "t"})),
        ];

        let report = Generator::new(&fs)
            .with_layout(Layout::PerScope)
            .write(Path::new("/out"), &items)
            .unwrap();

        let paths: Vec<&str> = report.modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["default/criblio_source", "global/criblio_notification_target"]);
        assert!(fs.has_file(Path::new("/out/default/criblio_source/main.tf")));

        let imports = read(&fs, "/out/imports.tf");
        assert!(imports.contains("to = module.default_criblio_source.criblio_source.source_a"));
    }

    #[test]
    fn test_output_is_byte_identical_regardless_of_input_order() {
        let items = vec![
            item("criblio_source", "source_b", "k2", Some("default"), json!({"id": "b"})),
            item("criblio_pipeline", "pipeline_a", "k3", Some("default"), json!({"id": "p"})),
            item("criblio_source", "source_a", "k1", Some("default"), json!({"id": "a"})),
        ];
        let mut reversed = items.clone();
        reversed.reverse();

        let first = MockFileSystem::new();
        let second = MockFileSystem::new();
        Generator::new(&first).write(Path::new("/out"), &items).unwrap();
        Generator::new(&second).write(Path::new("/out"), &reversed).unwrap();

        for path in first.list_files() {
            assert_eq!(first.get_file_contents(&path), second.get_file_contents(&path));
        }
    }

    #[test]
    fn test_clean_removes_generated_files_only() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/out/old/main.tf"), "x").unwrap();
        fs.write(Path::new("/out/README.md"), "keep").unwrap();

        assert_eq!(Generator::new(&fs).clean(Path::new("/out")).unwrap(), 1);
        assert!(fs.has_file(Path::new("/out/README.md")));
        assert_eq!(Generator::new(&fs).clean(Path::new("/missing")).unwrap(), 0);
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!("per-scope".parse::<Layout>().unwrap(), Layout::PerScope);
        assert!("nested".parse::<Layout>().is_err());
    }
}
