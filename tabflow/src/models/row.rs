//! The record flowing through a conversion.
//!
//! A [`Row`] keeps two synchronized views of the same data:
//!
//! - the flat view: dotted keys to leaf values (scalars and arrays)
//! - the nested view: the equivalent tree of objects
//!
//! Every mutation goes through [`Row::set`] or [`Row::remove`], which keep
//! `nest(flat) == nested` and `flatten(nested) == flat` after each call.

use serde_json::{Map, Value};

use crate::error::{RowError, RowResult};

use super::path;
use super::value::{flatten_at, ValueKind};

/// Top-level key of the scratch namespace.
pub const STAGING_FIELD: &str = "staging";

/// Key of the original-record snapshot under the staging namespace.
pub const INPUT_FIELD: &str = "input";

/// Source file name, written under the staging namespace.
pub const FILE_FIELD: &str = "file";

/// 0-based index of the row within its file, written under the staging namespace.
pub const ROW_INDEX_FIELD: &str = "row_index";

/// `"<file>:<index>"` locator, written under the staging namespace.
pub const FILE_ROW_INDEX_FIELD: &str = "file_row_index";

/// Maximum object nesting accepted by [`Row::set`].
pub const MAX_SET_DEPTH: usize = 10;

/// A record with flat and nested views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    flat: Map<String, Value>,
    nested: Map<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from a flat mapping. Keys may be dotted; object values are
    /// expanded.
    pub fn from_flat(flat: Map<String, Value>) -> RowResult<Self> {
        let mut row = Row::new();
        for (key, value) in flat {
            row.set(&key, value)?;
        }
        Ok(row)
    }

    /// Build a row from a JSON record, which must be an object.
    pub fn from_value(value: Value) -> RowResult<Self> {
        match value {
            Value::Object(map) => Self::from_flat(map),
            other => Err(RowError::NotAnObject(truncate(&other.to_string(), 80))),
        }
    }

    pub fn flat(&self) -> &Map<String, Value> {
        &self.flat
    }

    pub fn nested(&self) -> &Map<String, Value> {
        &self.nested
    }

    pub fn into_flat(self) -> Map<String, Value> {
        self.flat
    }

    /// Nested view as a JSON object value.
    pub fn to_nested_value(&self) -> Value {
        Value::Object(self.nested.clone())
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// Raw lookup of a dotted path, without staging fallbacks.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path::lookup(&self.nested, path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    /// Write `value` at `path`.
    ///
    /// Object values are expanded leaf by leaf and merged into whatever is
    /// already there; an empty object writes nothing. Any other value
    /// replaces the node at `path`.
    pub fn set(&mut self, path: &str, value: Value) -> RowResult<()> {
        let mut leaves = Vec::new();
        expand_leaves(path, value, 0, &mut leaves)?;
        for (leaf_path, leaf) in leaves {
            self.write_leaf(&leaf_path, leaf);
        }
        Ok(())
    }

    /// Remove the node at `path`, returning it.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments = path::segments(path);
        let removed = path::remove(&mut self.nested, &segments)?;
        self.sync_flat(&segments);
        Some(removed)
    }

    /// Resolve a source path with staging fallbacks.
    ///
    /// Tried in order: `staging.<path>`, `staging.input.<path>`, `<path>`.
    /// A hit on the raw path is written back at that path.
    pub fn search(&mut self, path: &str) -> Option<Value> {
        if let Some(value) = self.get_path(&staging_path(path)) {
            return Some(value.clone());
        }
        if let Some(value) = self.get_path(&input_path(path)) {
            return Some(value.clone());
        }

        let value = self.get_path(path)?.clone();
        if !value.is_object() {
            self.write_leaf(path, value.clone());
        }
        Some(value)
    }

    /// [`Row::search`] with a fallback value.
    pub fn get(&mut self, path: &str, default: Value) -> Value {
        self.search(path).unwrap_or(default)
    }

    /// Write under the staging namespace.
    pub fn set_staging(&mut self, target: &str, value: Value) -> RowResult<()> {
        self.set(&staging_path(target), value)
    }

    /// Copy flat entries under `staging.input`.
    ///
    /// The entries are already leaves, so the extra prefix does not count
    /// against [`MAX_SET_DEPTH`].
    pub fn set_input_snapshot(&mut self, snapshot: Map<String, Value>) {
        for (key, value) in snapshot {
            self.write_leaf(&input_path(&key), value);
        }
    }

    pub fn has_staging(&self) -> bool {
        self.nested.contains_key(STAGING_FIELD)
    }

    /// Detach the staging namespace.
    pub fn pop_staging(&mut self) -> Option<Value> {
        self.remove(STAGING_FIELD)
    }

    /// Keys of the nested view outside the staging namespace.
    pub fn raw_keys(&self) -> Vec<String> {
        self.nested
            .keys()
            .filter(|key| key.as_str() != STAGING_FIELD)
            .cloned()
            .collect()
    }

    fn write_leaf(&mut self, path: &str, value: Value) {
        let segments = path::segments(path);
        path::insert(&mut self.nested, &segments, value);
        self.sync_flat(&segments);
    }

    /// Re-derive the flat entries affected by a write or removal at
    /// `segments`.
    fn sync_flat(&mut self, segments: &[&str]) {
        let anchor = path::flat_anchor(&self.nested, segments);
        let prefix = segments[..anchor].join(".");
        let fresh = match path::lookup_segments(&self.nested, &segments[..anchor]) {
            Some(value) => flatten_at(&prefix, value),
            None => Map::new(),
        };

        // Ancestors that used to be leaves are now objects (or gone).
        let ancestors: Vec<String> = (1..anchor).map(|i| segments[..i].join(".")).collect();
        let subtree = format!("{}.", prefix);
        self.flat.retain(|key, _| {
            if ancestors.iter().any(|a| a == key) {
                return fresh.contains_key(key);
            }
            let under = key == &prefix || key.starts_with(&subtree);
            !under || fresh.contains_key(key)
        });
        for (key, value) in fresh {
            self.flat.insert(key, value);
        }
    }
}

/// `staging.<path>`
pub fn staging_path(path: &str) -> String {
    path::join(STAGING_FIELD, path)
}

/// `staging.input.<path>`
pub fn input_path(path: &str) -> String {
    format!("{}.{}.{}", STAGING_FIELD, INPUT_FIELD, path)
}

fn expand_leaves(
    path: &str,
    value: Value,
    depth: usize,
    out: &mut Vec<(String, Value)>,
) -> RowResult<()> {
    if depth > MAX_SET_DEPTH {
        return Err(RowError::DepthExceeded {
            path: path.to_string(),
            limit: MAX_SET_DEPTH,
        });
    }
    match (ValueKind::of(&value), value) {
        (ValueKind::Object, Value::Object(map)) => {
            for (key, member) in map {
                expand_leaves(&path::join(path, &key), member, depth + 1, out)?;
            }
        }
        (_, leaf) => out.push((path.to_string(), leaf)),
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
