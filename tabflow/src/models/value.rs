//! Value model shared by rows, actions and writers.
//!
//! Values are `serde_json::Value`s classified into three kinds so that
//! flattening and nesting are total functions: objects are always expanded
//! into dotted keys, everything else (scalars and sequences) is a leaf.

use serde_json::{Map, Value};

use super::path;

/// Structural kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// null, bool, number or string
    Scalar,
    /// JSON array; always a leaf in the flat view
    Sequence,
    /// JSON object; never a leaf in the flat view
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => ValueKind::Sequence,
            Value::Object(_) => ValueKind::Object,
            _ => ValueKind::Scalar,
        }
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, ValueKind::Object)
    }
}

/// Boolean coercion of a value.
///
/// `null`, `false`, `0`, `0.0`, `""` and empty arrays/objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Render a value as plain text: strings verbatim, null empty, others as JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a nested tree into dotted keys.
pub fn flatten(nested: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in nested {
        flatten_into(&mut flat, key.clone(), value);
    }
    flat
}

/// Flatten one subtree rooted at `prefix`.
pub fn flatten_at(prefix: &str, value: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    flatten_into(&mut flat, prefix.to_string(), value);
    flat
}

fn flatten_into(flat: &mut Map<String, Value>, prefix: String, value: &Value) {
    match (ValueKind::of(value), value) {
        (ValueKind::Object, Value::Object(map)) => {
            for (key, member) in map {
                flatten_into(flat, path::join(&prefix, key), member);
            }
        }
        (_, leaf) => {
            flat.insert(prefix, leaf.clone());
        }
    }
}

/// Rebuild the nested tree from dotted keys.
///
/// When two keys conflict (`a` and `a.b`) the later one wins.
pub fn nest(flat: &Map<String, Value>) -> Map<String, Value> {
    let mut nested = Map::new();
    for (key, value) in flat {
        path::insert(&mut nested, &path::segments(key), value.clone());
    }
    nested
}
