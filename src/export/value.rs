//! Semantic value model
//!
//! Every converted or resolved payload is expressed as a [`Value`] tree before
//! rendering. `Null` means "absent" and is never conflated with an empty
//! string, list, or map.

use std::collections::{BTreeMap, HashSet};

/// A closed value tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A value the API returned masked or that must not be written verbatim
    Sensitive(String),
    /// Reference to a named input variable
    VarRef(String),
}

impl Value {
    /// Build a value tree from a JSON payload, sorting map keys
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a map field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|fields| fields.get(key))
    }

    /// Follow a dotted path through nested maps
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// Set a value at a dotted path, creating intermediate maps.
    ///
    /// Returns false when an intermediate segment exists but is not a map.
    pub fn set_path(&mut self, path: &str, value: Value) -> bool {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = match segments.pop() {
            Some(last) => last,
            None => return false,
        };

        let mut current = self;
        for segment in segments {
            let fields = match current.as_map_mut() {
                Some(fields) => fields,
                None => return false,
            };
            let next = fields
                .entry(segment.to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if next.is_null() {
                *next = Value::Map(BTreeMap::new());
            }
            current = next;
        }

        match current.as_map_mut() {
            Some(fields) => {
                fields.insert(last.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Remove null-valued map entries and null list elements, recursively
    pub fn prune_nulls(&mut self) {
        match self {
            Value::Map(fields) => {
                fields.retain(|_, v| !v.is_null());
                for v in fields.values_mut() {
                    v.prune_nulls();
                }
            }
            Value::List(items) => {
                items.retain(|v| !v.is_null());
                for v in items.iter_mut() {
                    v.prune_nulls();
                }
            }
            _ => {}
        }
    }

    /// Remove empty-list map entries, recursively.
    ///
    /// Entries whose dotted path is named in `keep` survive even when empty.
    pub fn prune_empty_lists(&mut self, keep: &HashSet<String>) {
        self.prune_empty_lists_at("", keep);
    }

    fn prune_empty_lists_at(&mut self, prefix: &str, keep: &HashSet<String>) {
        match self {
            Value::Map(fields) => {
                fields.retain(|k, v| {
                    !matches!(v, Value::List(items) if items.is_empty())
                        || keep.contains(&join_path(prefix, k))
                });
                for (k, v) in fields.iter_mut() {
                    v.prune_empty_lists_at(&join_path(prefix, k), keep);
                }
            }
            Value::List(items) => {
                for v in items.iter_mut() {
                    v.prune_empty_lists_at(prefix, keep);
                }
            }
            _ => {}
        }
    }

    /// Rewrite variable references named in `renames`, all in one pass
    pub fn rename_var_refs(&mut self, renames: &BTreeMap<String, String>) {
        match self {
            Value::VarRef(name) => {
                if let Some(to) = renames.get(name.as_str()) {
                    *name = to.clone();
                }
            }
            Value::List(items) => items.iter_mut().for_each(|v| v.rename_var_refs(renames)),
            Value::Map(fields) => fields
                .values_mut()
                .for_each(|v| v.rename_var_refs(renames)),
            _ => {}
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_null_and_empty_distinct() {
        let v = Value::from_json(&json!({"absent": null, "empty": [], "blank": "", "obj": {}}));

        assert_eq!(v.get("absent"), Some(&Value::Null));
        assert_eq!(v.get("empty"), Some(&Value::List(vec![])));
        assert_eq!(v.get("blank"), Some(&Value::String(String::new())));
        assert_eq!(v.get("obj"), Some(&Value::Map(BTreeMap::new())));
        assert_ne!(v.get("absent"), v.get("empty"));
    }

    #[test]
    fn test_prune_nulls_keeps_empty_collections() {
        let mut v = Value::from_json(&json!({"a": null, "b": [], "c": {"d": null, "e": 1}}));
        v.prune_nulls();

        assert!(v.get("a").is_none());
        assert_eq!(v.get("b"), Some(&Value::List(vec![])));
        assert!(v.get_path("c.d").is_none());
        assert_eq!(v.get_path("c.e"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_prune_empty_lists_respects_keep() {
        let mut v = Value::from_json(&json!({"routes": [], "tags": [], "conf": {"x": []}}));
        let keep: HashSet<String> = ["routes".to_string()].into_iter().collect();
        v.prune_empty_lists(&keep);

        assert_eq!(v.get("routes"), Some(&Value::List(vec![])));
        assert!(v.get("tags").is_none());
        assert_eq!(v.get("conf"), Some(&Value::Map(BTreeMap::new())));

        let mut nested = Value::from_json(&json!({"conf": {"functions": [], "x": []}}));
        let keep: HashSet<String> = ["conf.functions".to_string()].into_iter().collect();
        nested.prune_empty_lists(&keep);
        assert_eq!(nested.get_path("conf.functions"), Some(&Value::List(vec![])));
        assert!(nested.get_path("conf.x").is_none());
    }

    #[test]
    fn test_set_path_creates_intermediate_maps() {
        let mut v = Value::Map(BTreeMap::new());
        assert!(v.set_path("conf.functions", Value::List(vec![])));
        assert_eq!(v.get_path("conf.functions"), Some(&Value::List(vec![])));

        let mut scalar_parent = Value::from_json(&json!({"conf": "text"}));
        assert!(!scalar_parent.set_path("conf.functions", Value::List(vec![])));
    }

    #[test]
    fn test_rename_var_refs_is_exact_and_simultaneous() {
        let mut v = Value::Map(BTreeMap::new());
        v.set_path("a.secret", Value::VarRef("x_secret".to_string()));
        v.set_path("b", Value::VarRef("x_secret_2".to_string()));
        v.set_path("c", Value::VarRef("x_secret_long".to_string()));

        let mut renames = BTreeMap::new();
        renames.insert("x_secret".to_string(), "x_secret_2".to_string());
        renames.insert("x_secret_2".to_string(), "x_secret_3".to_string());
        v.rename_var_refs(&renames);

        assert_eq!(v.get_path("a.secret"), Some(&Value::VarRef("x_secret_2".to_string())));
        assert_eq!(v.get("b"), Some(&Value::VarRef("x_secret_3".to_string())));
        assert_eq!(v.get("c"), Some(&Value::VarRef("x_secret_long".to_string())));
    }
}
