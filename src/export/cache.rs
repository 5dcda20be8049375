use std::collections::HashMap;
use std::sync::Mutex;

use super::identifiers::DiscoveredIdentifier;

/// Raw list items captured during listing, for per-item fallback conversion.
///
/// One cache is created per export run and handed to both the listing step
/// and the converter.
#[derive(Debug, Default)]
pub struct ListCache {
    items: Mutex<HashMap<(String, DiscoveredIdentifier), serde_json::Value>>,
}

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, type_name: &str, ids: &DiscoveredIdentifier, item: serde_json::Value) {
        if let Ok(mut items) = self.items.lock() {
            items.insert((type_name.to_string(), ids.clone()), item);
        }
    }

    pub fn get(&self, type_name: &str, ids: &DiscoveredIdentifier) -> Option<serde_json::Value> {
        self.items
            .lock()
            .ok()?
            .get(&(type_name.to_string(), ids.clone()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_and_get() {
        let cache = ListCache::new();
        let ids = DiscoveredIdentifier::from([("group", "default"), ("id", "out")]);
        cache.store("criblio_destination", &ids, json!({"id": "out"}));

        assert_eq!(cache.get("criblio_destination", &ids), Some(json!({"id": "out"})));
        assert_eq!(cache.get("criblio_source", &ids), None);
    }
}
