//! Context-scoped surrogate id allocation.
//!
//! Rows are grouped into buckets by their context columns (names and
//! values) and the primary column names. Inside a bucket, each distinct
//! primary value tuple gets a sequential id starting at 1, in first-seen
//! order across the whole run.
//!
//! ```text
//! category=x, key=k1  →  bucket (category=x | key) → id 1
//! category=x, key=k1  →  bucket (category=x | key) → id 1
//! category=y, key=k1  →  bucket (category=y | key) → id 1
//! category=x, key=k2  →  bucket (category=x | key) → id 2
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;

use crate::error::{ActionError, ActionResult, ConfigError};
use crate::models::Row;

/// Bucket selector: context column names + their values + primary column
/// names. Values are held in canonical JSON form so the key is hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub context_columns: Vec<String>,
    pub context_values: Vec<String>,
    pub primary_columns: Vec<String>,
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context: Vec<String> = self
            .context_columns
            .iter()
            .zip(&self.context_values)
            .map(|(column, value)| format!("{}={}", column, value))
            .collect();
        write!(f, "[{}] by [{}]", context.join(", "), self.primary_columns.join(", "))
    }
}

/// Id assignments within one bucket.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    max_id: u64,
    value_to_id: HashMap<Vec<String>, u64>,
    id_to_value: BTreeMap<u64, Vec<Value>>,
}

impl IdMap {
    /// Highest id handed out or registered so far.
    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    pub fn len(&self) -> usize {
        self.id_to_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_value.is_empty()
    }

    /// Id of a primary value tuple, if known.
    pub fn id_of(&self, values: &[Value]) -> Option<u64> {
        self.value_to_id.get(&canonical(values)).copied()
    }

    /// Primary value tuple owning an id, if any.
    pub fn values_of(&self, id: u64) -> Option<&[Value]> {
        self.id_to_value.get(&id).map(Vec::as_slice)
    }
}

/// Run-wide allocator shared by every row of every input.
#[derive(Debug, Default)]
pub struct IdAllocator {
    buckets: HashMap<ContextKey, IdMap>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets created so far.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket(&self, key: &ContextKey) -> Option<&IdMap> {
        self.buckets.get(key)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&ContextKey, &IdMap)> {
        self.buckets.iter()
    }

    /// Return the id for the row's primary tuple, allocating `max_id + 1` on
    /// first sight.
    pub fn allocate(
        &mut self,
        row: &mut Row,
        primary: &[String],
        context: &[String],
    ) -> ActionResult<u64> {
        let (key, values) = resolve_key(row, primary, context)?;
        let bucket = self.buckets.entry(key).or_default();

        let canonical_values = canonical(&values);
        if let Some(id) = bucket.value_to_id.get(&canonical_values) {
            return Ok(*id);
        }

        let id = bucket.max_id + 1;
        bucket.max_id = id;
        bucket.value_to_id.insert(canonical_values, id);
        bucket.id_to_value.insert(id, values);
        Ok(id)
    }

    /// Register a caller-supplied id for the row's primary tuple.
    ///
    /// Fails with `IdCollision` when the id belongs to another tuple, or the
    /// tuple already holds a different id. Re-registering the same pair is a
    /// no-op.
    pub fn assign_explicit(
        &mut self,
        row: &mut Row,
        primary: &[String],
        context: &[String],
        id: u64,
    ) -> ActionResult<()> {
        let (key, values) = resolve_key(row, primary, context)?;
        let context_label = key.to_string();
        let bucket = self.buckets.entry(key).or_default();
        let canonical_values = canonical(&values);

        if let Some(owner) = bucket.id_to_value.get(&id) {
            if canonical(owner) != canonical_values {
                return Err(ActionError::IdCollision {
                    id,
                    context: context_label,
                    detail: format!(
                        "already assigned to {}, requested for {}",
                        Value::Array(owner.clone()),
                        Value::Array(values)
                    ),
                });
            }
            return Ok(());
        }

        if let Some(existing) = bucket.value_to_id.get(&canonical_values) {
            return Err(ActionError::IdCollision {
                id,
                context: context_label,
                detail: format!(
                    "{} already holds id {}",
                    Value::Array(values),
                    existing
                ),
            });
        }

        bucket.max_id = bucket.max_id.max(id);
        bucket.value_to_id.insert(canonical_values, id);
        bucket.id_to_value.insert(id, values);
        Ok(())
    }
}

/// Resolve context and primary columns through the row's search rule.
fn resolve_key(
    row: &mut Row,
    primary: &[String],
    context: &[String],
) -> ActionResult<(ContextKey, Vec<Value>)> {
    if primary.is_empty() {
        return Err(ConfigError::InvalidOption {
            action: "assign-id".to_string(),
            option: "primary".to_string(),
            message: "at least one primary column is required".to_string(),
        }
        .into());
    }

    let context_values = resolve_columns(row, context)?;
    let primary_values = resolve_columns(row, primary)?;

    let key = ContextKey {
        context_columns: context.to_vec(),
        context_values: context_values.iter().map(Value::to_string).collect(),
        primary_columns: primary.to_vec(),
    };
    Ok((key, primary_values))
}

fn resolve_columns(row: &mut Row, columns: &[String]) -> ActionResult<Vec<Value>> {
    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        match row.search(column) {
            Some(value) => values.push(value),
            None => {
                let existing: Vec<&str> = row.flat().keys().map(String::as_str).collect();
                return Err(ActionError::MissingField {
                    field: column.clone(),
                    detail: format!("column not found, existing columns: {}", existing.join(", ")),
                });
            }
        }
    }
    Ok(values)
}

fn canonical(values: &[Value]) -> Vec<String> {
    values.iter().map(Value::to_string).collect()
}
