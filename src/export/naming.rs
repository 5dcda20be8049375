//! Stable resource names

use std::collections::HashSet;

use super::identifiers::DiscoveredIdentifier;
use super::registry::short_type_name;

/// Deterministic local name for a resource: the short type name followed by
/// the identifier values ordered by key.
pub fn stable_name(type_name: &str, ids: &DiscoveredIdentifier) -> String {
    let short = short_type_name(type_name);
    let mut parts = vec![short];
    parts.extend(ids.sorted_values().into_iter().filter(|v| !v.is_empty()));

    let name = sanitize_identifier(&parts.join("_"));
    if name == "resource" {
        sanitize_identifier(short)
    } else {
        name
    }
}

/// Sanitize a string into a valid configuration-language identifier
pub fn sanitize_identifier(raw: &str) -> String {
    let mut sanitized = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if c == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(c);
    }

    let sanitized = sanitized.trim_matches('_');

    match sanitized.chars().next() {
        None => "resource".to_string(),
        Some(first) if first.is_ascii_digit() => format!("r_{}", sanitized),
        Some(_) => sanitized.to_string(),
    }
}

/// Hands out collision-free names in call order.
///
/// The first request for a base name gets it unchanged; later requests get
/// `_2`, `_3`, ... skipping any suffix already taken.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_name_from_sorted_identifiers() {
        let ids = DiscoveredIdentifier::from([("id", "input-1"), ("group", "default")]);
        assert_eq!(stable_name("criblio_source", &ids), "source_default_input_1");
    }

    #[test]
    fn test_stable_name_ignores_insertion_order() {
        let a = DiscoveredIdentifier::new().with("a", "x").with("b", "y");
        let b = DiscoveredIdentifier::new().with("b", "y").with("a", "x");
        assert_eq!(stable_name("criblio_pack", &a), stable_name("criblio_pack", &b));
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("My Source.v2"), "my_source_v2");
        assert_eq!(sanitize_identifier("9lives"), "r_9lives");
        assert_eq!(sanitize_identifier("--"), "resource");
        assert_eq!(sanitize_identifier("a__b"), "a_b");
    }

    #[test]
    fn test_allocator_suffixes_in_order() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("source_a"), "source_a");
        assert_eq!(names.allocate("source_a"), "source_a_2");
        assert_eq!(names.allocate("source_a_3"), "source_a_3");
        assert_eq!(names.allocate("source_a"), "source_a_4");

        for name in ["source_a_2", "source_a_4"] {
            assert_eq!(sanitize_identifier(name), name);
        }
    }
}
