//! SQL text helpers
//!
//! Quoting for identifiers and string literals used when directives and
//! ETL statements are rendered for the engine.

use once_cell::sync::Lazy;
use regex::Regex;

static SIMPLE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Words that must be quoted even though they look like plain identifiers.
const RESERVED: &[&str] = &[
    "all", "and", "as", "by", "case", "create", "default", "delete", "from", "group", "having",
    "in", "insert", "into", "join", "limit", "not", "null", "on", "or", "order", "select",
    "table", "to", "union", "update", "using", "view", "where", "with",
];

/// Check whether a name can be emitted without quotes
pub fn is_simple_identifier(name: &str) -> bool {
    SIMPLE_IDENTIFIER.is_match(name) && !RESERVED.contains(&name.to_ascii_lowercase().as_str())
}

/// Quote an identifier if needed
///
/// Simple names are returned unchanged so rendered statements stay readable;
/// anything else is wrapped in double quotes with embedded quotes doubled.
pub fn quote_ident(name: &str) -> String {
    if is_simple_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Quote a possibly dotted name (`schema.table`) part by part
pub fn quote_qualified(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Render a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Join a root location and an object name with exactly one separator
pub fn join_path(root: &str, name: &str) -> String {
    if root.is_empty() {
        name.to_string()
    } else if root.ends_with('/') {
        format!("{}{}", root, name)
    } else {
        format!("{}/{}", root, name)
    }
}
