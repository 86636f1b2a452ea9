//! Row actions.
//!
//! Each [`Action`] reads fields through [`Row::search`] and writes its result
//! under the staging namespace. [`Action::Filter`] is the only action that can
//! drop a row.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{ActionError, ActionResult, ConfigError, ConfigResult};
use crate::models::{is_truthy, staging_path, to_text, Row};
use crate::transform::ids::IdAllocator;

/// Literal spellings that mean "no value" for `Assign` defaults.
const NONE_LITERALS: [&str; 4] = ["None", "none", "null", "Null"];

/// `{path}` placeholder in `assign-format` templates.
const PLACEHOLDER_PATTERN: &str = r"\{([^{}]+)\}";

static PLACEHOLDER: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(PLACEHOLDER_PATTERN));

/// All available row actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    /// Write a literal, coerced to `value_type` when given
    AssignConstant {
        target: String,
        value: Value,
        #[serde(default)]
        value_type: Option<LiteralType>,
    },

    /// Copy a field, with optional default and required check
    Assign {
        target: String,
        source: String,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        assign_default: bool,
        #[serde(default)]
        default_value: Value,
        #[serde(default)]
        required_policy: RequiredPolicy,
    },

    /// Split a string field into a list
    Split {
        target: String,
        source: String,
        /// `None` splits on runs of whitespace
        #[serde(default)]
        delimiter: Option<String>,
    },

    /// Collect several fields into one list
    AssignArray {
        target: String,
        members: Vec<ArrayMember>,
    },

    /// Append a field to a list, optionally behind a condition
    Push {
        target: String,
        source: String,
        #[serde(default)]
        condition: Option<String>,
    },

    /// Context-scoped sequential id
    AssignId {
        target: String,
        primary: Vec<String>,
        #[serde(default)]
        context: Vec<String>,
        /// Register an id already present at `staging.target` instead of
        /// allocating a new one
        #[serde(default)]
        keep_existing: bool,
    },

    /// Length of a list, string or object
    AssignLength { target: String, source: String },

    /// Render a `{path}` template
    AssignFormat { target: String, template: String },

    /// Keep the row only when the predicate holds
    Filter {
        source: String,
        op: FilterOp,
        #[serde(default)]
        value: Option<String>,
    },
}

/// Result of applying an action to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Keep,
    Filtered,
}

/// One member of an `assign-array` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMember {
    pub field: String,
    #[serde(default)]
    pub optional: bool,
}

impl ArrayMember {
    pub fn new(field: impl Into<String>, optional: bool) -> Self {
        Self {
            field: field.into(),
            optional,
        }
    }
}

/// Literal types accepted by `assign-constant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralType {
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    Float,
    #[serde(alias = "bool")]
    Boolean,
}

impl FromStr for LiteralType {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "str" | "string" => Ok(LiteralType::String),
            "int" | "integer" => Ok(LiteralType::Integer),
            "float" => Ok(LiteralType::Float),
            "bool" | "boolean" => Ok(LiteralType::Boolean),
            other => Err(ConfigError::UnsupportedType(other.to_string())),
        }
    }
}

impl LiteralType {
    /// Coerce a literal to this type.
    pub fn coerce(&self, value: &Value) -> ConfigResult<Value> {
        let invalid = |expected: &str| ConfigError::InvalidOption {
            action: "assign-constant".to_string(),
            option: "value".to_string(),
            message: format!("{} is not a valid {}", value, expected),
        };

        match self {
            LiteralType::String => Ok(Value::String(to_text(value))),
            LiteralType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::Number(n) => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| Value::Number((f as i64).into()))
                    .ok_or_else(|| invalid("integer")),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|n| Value::Number(n.into()))
                    .map_err(|_| invalid("integer")),
                Value::Bool(b) => Ok(Value::Number(i64::from(*b).into())),
                _ => Err(invalid("integer")),
            },
            LiteralType::Float => {
                let parsed = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                parsed
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| invalid("float"))
            }
            LiteralType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(true))),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err(invalid("boolean")),
                },
                _ => Err(invalid("boolean")),
            },
        }
    }
}

/// How strictly `assign` treats a `required` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredPolicy {
    /// Found and truthy: `0`, `""`, `false`, `null` and empty lists fail.
    #[default]
    Truthy,
    /// Found, whatever the value.
    Present,
}

impl RequiredPolicy {
    pub fn accepts(&self, found: Option<&Value>) -> bool {
        match (self, found) {
            (_, None) => false,
            (RequiredPolicy::Truthy, Some(value)) => is_truthy(value),
            (RequiredPolicy::Present, Some(_)) => true,
        }
    }
}

impl FromStr for RequiredPolicy {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "truthy" => Ok(RequiredPolicy::Truthy),
            "present" => Ok(RequiredPolicy::Present),
            other => Err(ConfigError::InvalidOption {
                action: "assign".to_string(),
                option: "policy".to_string(),
                message: format!("expected 'truthy' or 'present', got '{}'", other),
            }),
        }
    }
}

/// Predicates for `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Matches,
    Empty,
    NotEmpty,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::NotEquals => "not-equals",
            FilterOp::Matches => "matches",
            FilterOp::Empty => "empty",
            FilterOp::NotEmpty => "not-empty",
        }
    }

    fn needs_value(&self) -> bool {
        matches!(self, FilterOp::Equals | FilterOp::NotEquals | FilterOp::Matches)
    }

    /// Evaluate against a resolved value (`Null` when not found).
    pub fn holds(&self, value: &Value, expected: Option<&str>) -> ConfigResult<bool> {
        let expected = match (self.needs_value(), expected) {
            (true, None) => return Err(missing_filter_value(*self)),
            (_, expected) => expected.unwrap_or_default(),
        };

        Ok(match self {
            FilterOp::Equals => to_text(value) == expected,
            FilterOp::NotEquals => to_text(value) != expected,
            FilterOp::Matches => compile_pattern(expected)?.is_match(&to_text(value)),
            FilterOp::Empty => is_blank(value),
            FilterOp::NotEmpty => !is_blank(value),
        })
    }
}

impl FromStr for FilterOp {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "equals" | "eq" => Ok(FilterOp::Equals),
            "not-equals" | "ne" => Ok(FilterOp::NotEquals),
            "matches" => Ok(FilterOp::Matches),
            "empty" => Ok(FilterOp::Empty),
            "not-empty" => Ok(FilterOp::NotEmpty),
            other => Err(ConfigError::InvalidOption {
                action: "filter".to_string(),
                option: other.to_string(),
                message: "unknown filter predicate".to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    /// Mini-language name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AssignConstant { .. } => "assign-constant",
            Action::Assign { .. } => "assign",
            Action::Split { .. } => "split",
            Action::AssignArray { .. } => "assign-array",
            Action::Push { .. } => "push",
            Action::AssignId { .. } => "assign-id",
            Action::AssignLength { .. } => "assign-length",
            Action::AssignFormat { .. } => "assign-format",
            Action::Filter { .. } => "filter",
        }
    }

    /// Check settings that would otherwise only fail on the first row.
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            Action::AssignConstant {
                value,
                value_type: Some(literal_type),
                ..
            } => literal_type.coerce(value).map(|_| ()),
            Action::AssignId { primary, .. } if primary.is_empty() => {
                Err(ConfigError::InvalidOption {
                    action: self.name().to_string(),
                    option: "primary".to_string(),
                    message: "at least one primary column is required".to_string(),
                })
            }
            Action::Filter { op, value, .. } => {
                if op.needs_value() && value.is_none() {
                    return Err(missing_filter_value(*op));
                }
                if let (FilterOp::Matches, Some(pattern)) = (op, value) {
                    compile_pattern(pattern)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Apply this action to a row
    pub fn apply(&self, row: &mut Row, ids: &mut IdAllocator) -> ActionResult<ActionOutcome> {
        match self {
            Action::AssignConstant {
                target,
                value,
                value_type,
            } => {
                let value = match value_type {
                    Some(literal_type) => literal_type.coerce(value)?,
                    None => value.clone(),
                };
                row.set_staging(target, value)?;
            }
            Action::Assign {
                target,
                source,
                required,
                assign_default,
                default_value,
                required_policy,
            } => self.apply_assign(
                row,
                target,
                source,
                *required,
                assign_default.then_some(default_value),
                *required_policy,
            )?,
            Action::Split {
                target,
                source,
                delimiter,
            } => {
                if let Some(value) = row.search(source) {
                    let value = match value {
                        Value::String(text) => split_tokens(&text, delimiter.as_deref()),
                        other => other,
                    };
                    row.set_staging(target, value)?;
                }
            }
            Action::AssignArray { target, members } => {
                let items = collect_members(row, members);
                row.set_staging(target, Value::Array(items))?;
            }
            Action::Push {
                target,
                source,
                condition,
            } => push_value(row, target, source, condition.as_deref())?,
            Action::AssignId {
                target,
                primary,
                context,
                keep_existing,
            } => {
                let existing = if *keep_existing {
                    row.get_path(&staging_path(target)).and_then(as_id)
                } else {
                    None
                };
                let id = match existing {
                    Some(id) => {
                        ids.assign_explicit(row, primary, context, id)?;
                        id
                    }
                    None => ids.allocate(row, primary, context)?,
                };
                row.set_staging(target, Value::Number(id.into()))?;
            }
            Action::AssignLength { target, source } => assign_length(row, target, source)?,
            Action::AssignFormat { target, template } => {
                let rendered = render_template(row, template)?;
                row.set_staging(target, Value::String(rendered))?;
            }
            Action::Filter { source, op, value } => {
                let resolved = row.search(source).unwrap_or(Value::Null);
                if !op.holds(&resolved, value.as_deref())? {
                    return Ok(ActionOutcome::Filtered);
                }
            }
        }
        Ok(ActionOutcome::Keep)
    }

    fn apply_assign(
        &self,
        row: &mut Row,
        target: &str,
        source: &str,
        required: bool,
        default_value: Option<&Value>,
        policy: RequiredPolicy,
    ) -> ActionResult<()> {
        let found = row.search(source);
        if required && !policy.accepts(found.as_ref()) {
            let detail = match &found {
                None => "required field not found".to_string(),
                Some(value) => format!("required field is empty (value: {})", value),
            };
            return Err(ActionError::MissingField {
                field: source.to_string(),
                detail,
            });
        }

        match (found, default_value) {
            (Some(value), _) => row.set_staging(target, value)?,
            (None, Some(default)) => row.set_staging(target, collapse_none(default))?,
            (None, None) => {}
        }
        Ok(())
    }
}

/// `assign-array` semantics: non-null hits are appended, misses on
/// non-optional members leave a `null` placeholder.
pub fn collect_members(row: &mut Row, members: &[ArrayMember]) -> Vec<Value> {
    let mut items = Vec::with_capacity(members.len());
    for member in members {
        match row.search(&member.field) {
            Some(value) if !value.is_null() => items.push(value),
            _ if !member.optional => items.push(Value::Null),
            _ => {}
        }
    }
    items
}

/// `push` semantics: start from the current list at `target` (a lone value
/// is wrapped), append `source` when found and the condition holds.
pub fn push_value(
    row: &mut Row,
    target: &str,
    source: &str,
    condition: Option<&str>,
) -> ActionResult<()> {
    let mut items = match row.search(target) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    };

    let allowed = match condition {
        Some(condition) => row.search(condition).is_some_and(|v| is_truthy(&v)),
        None => true,
    };
    if allowed {
        if let Some(value) = row.search(source) {
            items.push(value);
        }
    }

    row.set_staging(target, Value::Array(items))?;
    Ok(())
}

/// `assign-length` semantics.
pub fn assign_length(row: &mut Row, target: &str, source: &str) -> ActionResult<()> {
    if let Some(value) = row.search(source) {
        row.set_staging(target, Value::Number(length_of(&value).into()))?;
    }
    Ok(())
}

fn length_of(value: &Value) -> u64 {
    let length = match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    };
    length as u64
}

fn split_tokens(text: &str, delimiter: Option<&str>) -> Value {
    let tokens: Vec<&str> = match delimiter {
        Some(delimiter) if !delimiter.is_empty() => text.split(delimiter).collect(),
        _ => text.split_whitespace().collect(),
    };
    Value::Array(
        tokens
            .into_iter()
            .filter(|token| !token.is_empty())
            .map(|token| Value::String(token.to_string()))
            .collect(),
    )
}

fn render_template(row: &mut Row, template: &str) -> ConfigResult<String> {
    let placeholder = PLACEHOLDER
        .as_ref()
        .map_err(|e| ConfigError::InvalidPattern {
            pattern: PLACEHOLDER_PATTERN.to_string(),
            message: e.to_string(),
        })?;
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for captures in placeholder.captures_iter(template) {
        let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        rendered.push_str(&template[last..whole.start()]);
        if let Some(value) = row.search(path.as_str().trim()) {
            rendered.push_str(&to_text(&value));
        }
        last = whole.end();
    }
    rendered.push_str(&template[last..]);
    Ok(rendered)
}

fn collapse_none(value: &Value) -> Value {
    match value {
        Value::String(s) if NONE_LITERALS.contains(&s.as_str()) => Value::Null,
        other => other.clone(),
    }
}

fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn compile_pattern(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn missing_filter_value(op: FilterOp) -> ConfigError {
    ConfigError::InvalidOption {
        action: "filter".to_string(),
        option: op.as_str().to_string(),
        message: "a comparison value is required".to_string(),
    }
}

/// Get a description of all available actions
pub fn actions_description() -> String {
    r#"Available row actions (name:fields[:options]):

| Action | Fields | Options | Effect |
|--------|--------|---------|--------|
| assign-constant | target=value | type=str|int|float|bool | write a typed literal to staging.target |
| assign | target=source | required, default=V, policy=truthy|present | copy a field; `default=None` writes null |
| split | target=source | delimiter=D (\n \t \r \\ escapes) | split a string into a list; no delimiter splits on whitespace |
| assign-array | target=a+b+c | optional | collect fields into a list; misses become null unless optional |
| push | target=source | condition=FIELD | append source to the list at target when FIELD is truthy |
| assign-id | target=key1+key2 | context=col1+col2, keep-existing | sequential id per distinct key within each context |
| assign-length | target=source | - | length of a list, string or object |
| assign-format | target=TEMPLATE | - | render {field} placeholders |
| filter | source | equals=V, not-equals=V, matches=RE, empty, not-empty | keep the row only when the predicate holds |

Fields are read from staging first, then the original input snapshot, then the raw row.
Results are written under `staging.`; use picks to place them in the output.

Examples:
  assign-constant:lang=ja:type=str
  assign:title=Title:required
  split:tags=Tags:delimiter=\n
  assign-array:people=author+editor:optional
  push:labels=label:condition=keep
  assign-id:work_id=title+year:context=category
  filter:status:equals=active"#
        .to_string()
}
