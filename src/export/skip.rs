//! Pre-conversion skip rules
//!
//! Decides, from identifiers alone, whether an item is a deny-listed or
//! built-in object that should never be converted.

use std::collections::HashSet;

use super::catalog;
use super::error::SkipReason;
use super::identifiers::DiscoveredIdentifier;

#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    deny: HashSet<(String, String)>,
    denied_packs: HashSet<String>,
}

impl SkipRules {
    /// Rules with the built-in pack deny list
    pub fn new() -> Self {
        Self {
            deny: HashSet::new(),
            denied_packs: catalog::DENIED_PACKS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Deny one identifier of one type
    pub fn deny(mut self, type_name: &str, id: &str) -> Self {
        self.deny.insert((type_name.to_string(), id.to_string()));
        self
    }

    pub fn deny_pack(mut self, pack: &str) -> Self {
        self.denied_packs.insert(pack.to_string());
        self
    }

    /// Why an item must be skipped, if it must
    pub fn check(&self, type_name: &str, ids: &DiscoveredIdentifier) -> Option<SkipReason> {
        let id = ids.get("id").unwrap_or_default();

        if self.deny.contains(&(type_name.to_string(), id.to_string())) {
            return Some(SkipReason::Excluded(format!("'{}' is deny-listed", id)));
        }

        if let Some(scope) = ids.non_empty("group") {
            if id == scope && !catalog::ONE_PER_SCOPE_TYPES.contains(&type_name) {
                return Some(SkipReason::Excluded(format!(
                    "identifier '{}' equals its scope",
                    id
                )));
            }
        }

        let pack = if type_name == catalog::PACK_TYPE {
            Some(id)
        } else {
            ids.non_empty("pack")
        };
        if let Some(pack) = pack {
            if self.denied_packs.contains(pack) {
                return Some(SkipReason::Excluded(format!("pack '{}' is denied", pack)));
            }
        }

        if catalog::DOTTED_BUILTIN_TYPES.contains(&type_name) && id.contains('.') {
            return Some(SkipReason::BuiltIn(format!("dotted identifier '{}'", id)));
        }

        if let Some(prefix) = catalog::default_namespaces(type_name)
            .iter()
            .find(|prefix| id.starts_with(*prefix))
        {
            return Some(SkipReason::BuiltIn(format!(
                "'{}' is in the reserved '{}' namespace",
                id, prefix
            )));
        }

        if catalog::default_ids(type_name).contains(&id) {
            return Some(SkipReason::BuiltIn(format!("default object '{}'", id)));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(group: &str, id: &str) -> DiscoveredIdentifier {
        DiscoveredIdentifier::from([("group", group), ("id", id)])
    }

    #[test]
    fn test_user_objects_pass() {
        let rules = SkipRules::new();
        assert_eq!(rules.check("criblio_source", &ids("default", "in_syslog")), None);
    }

    #[test]
    fn test_deny_list() {
        let rules = SkipRules::new().deny("criblio_pipeline", "legacy");
        assert!(matches!(
            rules.check("criblio_pipeline", &ids("default", "legacy")),
            Some(SkipReason::Excluded(_))
        ));
        assert_eq!(rules.check("criblio_routes", &ids("default", "legacy")), None);
    }

    #[test]
    fn test_id_equals_scope_respects_one_per_scope_exceptions() {
        let rules = SkipRules::new();
        assert!(rules.check("criblio_pipeline", &ids("default", "default")).is_some());
        assert_eq!(
            rules.check("criblio_mapping_ruleset", &ids("default", "default")),
            None
        );
    }

    #[test]
    fn test_denied_packs() {
        let rules = SkipRules::new().deny_pack("internal");
        let child = ids("default", "main").with("pack", "cribl");
        assert!(rules.check("criblio_pack_pipeline", &child).is_some());
        assert!(rules.check("criblio_pack", &ids("default", "internal")).is_some());
        assert_eq!(rules.check("criblio_pack", &ids("default", "my_pack")), None);
    }

    #[test]
    fn test_builtin_heuristics() {
        let rules = SkipRules::new();
        assert!(matches!(
            rules.check("criblio_global_var", &ids("default", "cribl.version")),
            Some(SkipReason::BuiltIn(_))
        ));
        assert!(matches!(
            rules.check(
                "criblio_lake_dataset",
                &DiscoveredIdentifier::from([("lake", "default"), ("id", "cribl_logs")])
            ),
            Some(SkipReason::BuiltIn(_))
        ));
        assert!(matches!(
            rules.check("criblio_destination", &ids("default", "devnull")),
            Some(SkipReason::BuiltIn(_))
        ));
        assert_eq!(rules.check("criblio_pipeline", &ids("default", "main.v2")), None);
    }
}
