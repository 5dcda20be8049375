//! HCL rendering of value trees
//!
//! Output is a pure function of its input: map keys come out in sorted order
//! and numbers, strings and collections always render the same way.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::value::Value;

const INDENT: &str = "  ";

lazy_static! {
    static ref BARE_KEY: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("bare key pattern is valid");
}

/// Quote and escape a string literal, including template sequences
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');

    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }

    out.push('"');
    out
}

/// Whether `k` can appear unquoted as an attribute or object key
pub fn is_identifier(k: &str) -> bool {
    BARE_KEY.is_match(k)
}

/// Object key: bare when it is a valid identifier, quoted otherwise
pub fn key(k: &str) -> String {
    if is_identifier(k) {
        k.to_string()
    } else {
        quote(k)
    }
}

pub fn number(n: f64) -> String {
    if !n.is_finite() {
        return "null".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Render a value as an expression at the given nesting depth
pub fn expression(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => quote(s),
        Value::Number(n) => number(*n),
        Value::Bool(b) => b.to_string(),
        Value::Sensitive(s) => format!("sensitive({})", quote(s)),
        Value::VarRef(name) => format!("var.{}", name),
        Value::List(items) if items.is_empty() => "[]".to_string(),
        Value::List(items) => {
            let inner = INDENT.repeat(depth + 1);
            let mut out = String::from("[\n");
            for item in items {
                out.push_str(&inner);
                out.push_str(&expression(item, depth + 1));
                out.push_str(",\n");
            }
            out.push_str(&INDENT.repeat(depth));
            out.push(']');
            out
        }
        Value::Map(fields) if fields.is_empty() => "{}".to_string(),
        Value::Map(fields) => {
            let mut out = String::from("{\n");
            for (k, v) in fields {
                out.push_str(&attribute(k, v, depth + 1));
            }
            out.push_str(&INDENT.repeat(depth));
            out.push('}');
            out
        }
    }
}

/// One `key = expression` line at the given depth
pub fn attribute(k: &str, v: &Value, depth: usize) -> String {
    format!("{}{} = {}\n", INDENT.repeat(depth), key(k), expression(v, depth))
}

/// A `resource "type" "name" { ... }` block.
///
/// Block bodies only accept identifier attribute names, so top-level fields
/// that are not identifiers are left out.
pub fn resource_block(
    type_name: &str,
    name: &str,
    value: &Value,
    lifecycle_ignore: &[String],
) -> String {
    let mut out = format!("resource {} {} {{\n", quote(type_name), quote(name));

    if let Value::Map(fields) = value {
        for (k, v) in fields {
            if !is_identifier(k) {
                warn!(type_name, name, attribute = %k, "skipping attribute that is not an identifier");
                continue;
            }
            out.push_str(&attribute(k, v, 1));
        }
    }

    if !lifecycle_ignore.is_empty() {
        let mut ignored: Vec<&str> = lifecycle_ignore.iter().map(String::as_str).collect();
        ignored.sort();
        ignored.dedup();
        out.push_str("\n  lifecycle {\n");
        out.push_str(&format!("    ignore_changes = [{}]\n", ignored.join(", ")));
        out.push_str("  }\n");
    }

    out.push_str("}\n");
    out
}
