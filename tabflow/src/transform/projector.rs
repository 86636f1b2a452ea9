//! Output projection.
//!
//! Builds the emitted row from the pick list:
//!
//! 1. each pick writes the resolved `source` at `target`
//! 2. staging fields are carried through unchanged
//! 3. raw fields no pick consumed are parked under `staging.` so they only
//!    survive in debug output
//!
//! An empty pick list is the identity over the original fields.

use serde_json::Value;

use crate::error::RowResult;
use crate::models::{path, staging_path, Row, INPUT_FIELD, STAGING_FIELD};

use super::dsl::PickConfig;

/// Project `row` through `picks` into a fresh row.
pub fn project(row: &mut Row, picks: &[PickConfig]) -> RowResult<Row> {
    let identity;
    let picks = if picks.is_empty() {
        identity = identity_picks(row);
        identity.as_slice()
    } else {
        picks
    };

    let mut projected = Row::new();
    let mut consumed: Vec<&str> = Vec::new();
    for pick in picks {
        if let Some(value) = row.search(&pick.source) {
            projected.set(&pick.target, value)?;
            consumed.push(&pick.source);
        }
    }

    let staging_prefix = format!("{}.", STAGING_FIELD);
    let (staged, raw): (Vec<_>, Vec<_>) = row
        .flat()
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .partition(|(key, _)| key.starts_with(&staging_prefix));

    for (key, value) in staged {
        if !projected.flat().contains_key(&key) {
            projected.set(&key, value)?;
        }
    }
    for (key, value) in raw {
        if is_consumed(&key, &consumed) {
            continue;
        }
        let parked = staging_path(&key);
        if !projected.flat().contains_key(&parked) {
            projected.set(&parked, value)?;
        }
    }

    Ok(projected)
}

/// One `key → key` pick per top-level field of the original snapshot, or of
/// the raw row when there is none.
pub fn identity_picks(row: &Row) -> Vec<PickConfig> {
    let snapshot = path::join(STAGING_FIELD, INPUT_FIELD);
    let keys: Vec<String> = match row.get_path(&snapshot) {
        Some(Value::Object(input)) => input.keys().cloned().collect(),
        _ => row.raw_keys(),
    };
    keys.into_iter()
        .map(|key| PickConfig {
            target: key.clone(),
            source: key,
        })
        .collect()
}

fn is_consumed(key: &str, consumed: &[&str]) -> bool {
    consumed.iter().any(|source| {
        key == *source
            || key
                .strip_prefix(source)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Row {
        Row::from_value(value).unwrap()
    }

    fn stamped(value: Value) -> Row {
        let mut r = row(value);
        let snapshot = r.to_nested_value();
        r.set_staging(INPUT_FIELD, snapshot).unwrap();
        r
    }

    fn pick(target: &str, source: &str) -> PickConfig {
        PickConfig {
            target: target.into(),
            source: source.into(),
        }
    }

    #[test]
    fn test_identity_projection() {
        let mut r = stamped(json!({"x": 1, "y": 2}));
        let mut projected = project(&mut r, &[]).unwrap();
        projected.pop_staging();
        assert_eq!(projected.to_nested_value(), json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_identity_without_snapshot() {
        let mut r = row(json!({"x": 1, "nested": {"a": true}}));
        let projected = project(&mut r, &[]).unwrap();
        assert_eq!(projected.to_nested_value(), json!({"x": 1, "nested": {"a": true}}));
    }

    #[test]
    fn test_identity_prefers_derived_values() {
        let mut r = stamped(json!({"title": "raw"}));
        r.set_staging("title", json!("derived")).unwrap();
        let mut projected = project(&mut r, &[]).unwrap();
        projected.pop_staging();
        assert_eq!(projected.to_nested_value(), json!({"title": "derived"}));
    }

    #[test]
    fn test_picks_rename_and_drop_raw_fields() {
        let mut r = stamped(json!({"Title": "Song", "Junk": "x"}));
        r.set_staging("year", json!(1999)).unwrap();

        let mut projected = project(
            &mut r,
            &[pick("meta.title", "Title"), pick("year", "year"), pick("absent", "nope")],
        )
        .unwrap();

        assert_eq!(projected.get_path("staging.Junk"), Some(&json!("x")));
        assert_eq!(projected.get_path("staging.year"), Some(&json!(1999)));
        assert!(projected.get_path("staging.Title").is_none());

        projected.pop_staging();
        assert_eq!(
            projected.to_nested_value(),
            json!({"meta": {"title": "Song"}, "year": 1999})
        );
    }

    #[test]
    fn test_projection_keeps_views_in_sync() {
        let mut r = stamped(json!({"a": {"b": 1}, "list": [1, 2]}));
        let projected = project(&mut r, &[pick("out", "a"), pick("items", "list")]).unwrap();
        assert_eq!(projected.flat()["out.b"], json!(1));
        assert_eq!(
            &crate::models::nest(projected.flat()),
            projected.nested()
        );
    }
}
