//! Secret extraction
//!
//! Secret-shaped strings are replaced with variable references so they are
//! never written into generated source.

use lazy_static::lazy_static;
use regex::Regex;

use super::naming::{sanitize_identifier, NameAllocator};
use super::value::Value;

/// Field names that carry credentials regardless of their value
const CREDENTIAL_FIELDS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "private_key",
    "priv_key",
    "passphrase",
    "client_secret",
    "auth_token",
    "secret_key",
    "secret_access_key",
];

lazy_static! {
    /// Reference to a value held in the server's secret store (`#42:c2VjcmV0`)
    static ref STORED_SECRET: Regex =
        Regex::new(r"^#\d+:[A-Za-z0-9+/=]+$").expect("stored secret pattern is valid");
}

pub fn is_stored_secret(value: &str) -> bool {
    STORED_SECRET.is_match(value)
}

/// Whether a field name denotes a credential (`password`, `hec_token`, ...)
pub fn is_credential_field(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    CREDENTIAL_FIELDS
        .iter()
        .any(|c| name == *c || name.ends_with(&format!("_{}", c)))
}

/// Replace secret values in a tree with variable references named
/// `{prefix}_{field_path}`. Paths that sanitize to the same name (`auth.token`
/// and `auth_token`) get numbered suffixes, so every secret has its own
/// variable. Returns the variable names used, sorted.
pub fn extract_secrets(value: &mut Value, prefix: &str) -> Vec<String> {
    let mut allocator = NameAllocator::new();
    let mut names = Vec::new();
    walk(value, prefix, None, &mut allocator, &mut names);
    names.sort();
    names
}

fn walk(
    value: &mut Value,
    path: &str,
    field: Option<&str>,
    allocator: &mut NameAllocator,
    names: &mut Vec<String>,
) {
    let replace = match &*value {
        Value::Sensitive(_) => true,
        Value::String(s) if !s.is_empty() => {
            is_stored_secret(s) || field.map(is_credential_field).unwrap_or(false)
        }
        _ => false,
    };

    if replace {
        let name = allocator.allocate(&sanitize_identifier(path));
        *value = Value::VarRef(name.clone());
        names.push(name);
        return;
    }

    match value {
        Value::Map(fields) => {
            for (key, child) in fields.iter_mut() {
                walk(
                    child,
                    &format!("{}_{}", path, key),
                    Some(key.as_str()),
                    allocator,
                    names,
                );
            }
        }
        Value::List(items) => {
            for (i, child) in items.iter_mut().enumerate() {
                walk(child, &format!("{}_{}", path, i), field, allocator, names);
            }
        }
        _ => {}
    }
}
