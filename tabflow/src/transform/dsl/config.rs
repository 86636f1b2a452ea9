//! Conversion configuration document
//!
//! Declares the output picks, the pre-stage transforms and the ordered action
//! list. Command-line picks and actions are appended after the ones read
//! from the file.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};

use super::actions::{Action, ArrayMember, FilterOp, LiteralType, RequiredPolicy};

/// A complete conversion configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Output columns: `target` receives the resolved `source`.
    /// Empty means identity over the original fields.
    #[serde(default)]
    pub pick: Vec<PickConfig>,

    /// Transforms run before the action list
    #[serde(default)]
    pub process: ProcessConfig,

    /// Ordered row actions
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// One output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickConfig {
    pub target: String,
    pub source: String,
}

/// Pre-stage transforms, applied in the order assign-array, push,
/// assign-length. Map sections run in the order the document declares them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// `target → members`
    #[serde(default)]
    pub assign_array: IndexMap<String, Vec<ArrayMember>>,

    #[serde(default)]
    pub push: Vec<PushConfig>,

    /// `target → source`
    #[serde(default)]
    pub assign_length: IndexMap<String, String>,
}

/// A pre-stage `push`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    pub target: String,
    pub source: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl ProcessConfig {
    pub fn is_empty(&self) -> bool {
        self.assign_array.is_empty() && self.push.is_empty() && self.assign_length.is_empty()
    }

    /// The pre-stage transforms as actions, in execution order.
    pub fn to_actions(&self) -> Vec<Action> {
        let arrays = self
            .assign_array
            .iter()
            .map(|(target, members)| Action::AssignArray {
                target: target.clone(),
                members: members.clone(),
            });
        let pushes = self.push.iter().map(|push| Action::Push {
            target: push.target.clone(),
            source: push.source.clone(),
            condition: push.condition.clone(),
        });
        let lengths = self
            .assign_length
            .iter()
            .map(|(target, source)| Action::AssignLength {
                target: target.clone(),
                source: source.clone(),
            });
        arrays.chain(pushes).chain(lengths).collect()
    }
}

impl ConvertConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON string
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every action and pick.
    pub fn validate(&self) -> ConfigResult<()> {
        for pick in &self.pick {
            if pick.target.is_empty() || pick.source.is_empty() {
                return Err(ConfigError::Malformed {
                    input: format!("{}={}", pick.target, pick.source),
                    message: "pick target and source must be non-empty".to_string(),
                });
            }
        }
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }

    /// Append command-line picks and actions after the declared ones.
    pub fn extend(&mut self, picks: Vec<PickConfig>, actions: Vec<Action>) {
        self.pick.extend(picks);
        self.actions.extend(actions);
    }
}

/// Generate an example configuration for documentation
pub fn example_config() -> ConvertConfig {
    let mut assign_array = IndexMap::new();
    assign_array.insert(
        "contributors".to_string(),
        vec![
            ArrayMember::new("author", false),
            ArrayMember::new("editor", true),
        ],
    );

    let mut assign_length = IndexMap::new();
    assign_length.insert("contributor_count".to_string(), "contributors".to_string());

    ConvertConfig {
        pick: vec![
            PickConfig {
                target: "id".to_string(),
                source: "work_id".to_string(),
            },
            PickConfig {
                target: "title".to_string(),
                source: "title".to_string(),
            },
            PickConfig {
                target: "tags".to_string(),
                source: "tags".to_string(),
            },
            PickConfig {
                target: "contributors".to_string(),
                source: "contributors".to_string(),
            },
        ],
        process: ProcessConfig {
            assign_array,
            push: vec![PushConfig {
                target: "tags".to_string(),
                source: "genre".to_string(),
                condition: Some("genre".to_string()),
            }],
            assign_length,
        },
        actions: vec![
            Action::Filter {
                source: "status".to_string(),
                op: FilterOp::NotEquals,
                value: Some("deleted".to_string()),
            },
            Action::Assign {
                target: "title".to_string(),
                source: "Title".to_string(),
                required: true,
                assign_default: false,
                default_value: Value::Null,
                required_policy: RequiredPolicy::Truthy,
            },
            Action::Split {
                target: "keywords".to_string(),
                source: "Keywords".to_string(),
                delimiter: Some("\n".to_string()),
            },
            Action::AssignConstant {
                target: "source".to_string(),
                value: Value::String("catalog".to_string()),
                value_type: Some(LiteralType::String),
            },
            Action::AssignId {
                target: "work_id".to_string(),
                primary: vec!["title".to_string()],
                context: vec!["category".to_string()],
                keep_existing: false,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_serialization() {
        let config = example_config();
        let json = config.to_json().unwrap();
        let parsed = ConvertConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_sections_are_optional() {
        let config = ConvertConfig::from_json("{}").unwrap();
        assert!(config.pick.is_empty());
        assert!(config.process.is_empty());
        assert!(config.actions.is_empty());
    }

    #[test]
    fn test_document_shape() {
        let config = ConvertConfig::from_json(
            &json!({
                "pick": [{"target": "name", "source": "title"}],
                "process": {
                    "assign_array": {"people": [{"field": "a"}, {"field": "b", "optional": true}]},
                    "push": [{"target": "tags", "source": "t"}],
                    "assign_length": {"n": "people"}
                },
                "actions": [
                    {"type": "assign-constant", "target": "k", "value": "1", "value_type": "int"},
                    {"type": "split", "target": "b", "source": "a"}
                ]
            })
            .to_string(),
        )
        .unwrap();

        let names: Vec<&str> = config.process.to_actions().iter().map(Action::name).collect();
        assert_eq!(names, vec!["assign-array", "push", "assign-length"]);
        assert_eq!(config.actions.len(), 2);
        assert_eq!(config.pick[0].source, "title");
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            ConvertConfig::from_json(r#"{"actions": [{"type": "rename"}]}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            ConvertConfig::from_json(
                r#"{"actions": [{"type": "filter", "source": "a", "op": "matches", "value": "("}]}"#
            ),
            Err(ConfigError::InvalidPattern { .. })
        ));
        assert!(matches!(
            ConvertConfig::from_path("/nonexistent/tabflow.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_extend_appends() {
        let mut config = example_config();
        let declared = config.actions.len();
        config.extend(
            vec![PickConfig {
                target: "x".into(),
                source: "y".into(),
            }],
            vec![Action::AssignLength {
                target: "n".into(),
                source: "tags".into(),
            }],
        );
        assert_eq!(config.actions.len(), declared + 1);
        assert_eq!(config.actions.last().map(Action::name), Some("assign-length"));
        assert_eq!(config.pick.last().map(|p| p.target.as_str()), Some("x"));
    }
}
