//! Dot-delimited field paths over a nested tree.
//!
//! A segment addresses an object key, or an index when the current node is
//! an array.

use serde_json::{Map, Value};

/// Split a dotted path into segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Join a prefix and a key with a dot.
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Resolve a path against the tree.
pub fn lookup<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    lookup_segments(root, &segments(path))
}

/// Resolve pre-split segments against the tree.
pub fn lookup_segments<'a>(root: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = root.get(*first)?;
    for segment in rest {
        current = child(current, segment)?;
    }
    Some(current)
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Write a value at the path, creating intermediate objects.
///
/// A scalar met on the way is replaced by an object. An array is indexed when
/// the segment is numeric (padding with nulls), otherwise replaced.
pub fn insert(root: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let slot = root.entry(first.to_string()).or_insert(Value::Null);
    insert_value(slot, rest, value);
}

fn insert_value(slot: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };

    if let Value::Array(items) = slot {
        if let Ok(index) = first.parse::<usize>() {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            insert_value(&mut items[index], rest, value);
            return;
        }
    }

    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let next = map.entry(first.to_string()).or_insert(Value::Null);
        insert_value(next, rest, value);
    }
}

/// Remove the value at the path, pruning objects left empty.
pub fn remove(root: &mut Map<String, Value>, segments: &[&str]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return remove_key(root, first);
    }

    let slot = root.get_mut(*first)?;
    let removed = remove_from(slot, rest)?;
    if matches!(slot, Value::Object(map) if map.is_empty()) {
        remove_key(root, first);
    }
    Some(removed)
}

fn remove_from(node: &mut Value, segments: &[&str]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return match node {
            Value::Object(map) => remove_key(map, first),
            Value::Array(items) => {
                let index = first.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        };
    }

    let next = child_mut(node, first)?;
    let removed = remove_from(next, rest)?;
    let emptied = matches!(next, Value::Object(map) if map.is_empty());
    if emptied {
        if let Value::Object(map) = node {
            remove_key(map, first);
        }
    }
    Some(removed)
}

/// Order-preserving key removal.
fn remove_key(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    let removed = map.get(key).cloned()?;
    map.retain(|k, _| k != key);
    Some(removed)
}

/// Number of leading segments that own a flat entry.
///
/// The walk stops at the first array or scalar: everything below it lives
/// inside a single flat leaf.
pub fn flat_anchor(root: &Map<String, Value>, segments: &[&str]) -> usize {
    let Some((first, rest)) = segments.split_first() else {
        return 0;
    };
    let mut current = match root.get(*first) {
        Some(value) => value,
        None => return segments.len(),
    };
    let mut depth = 1;
    for segment in rest {
        match current {
            Value::Object(map) => match map.get(*segment) {
                Some(next) => {
                    current = next;
                    depth += 1;
                }
                None => return segments.len(),
            },
            _ => return depth,
        }
    }
    depth
}
