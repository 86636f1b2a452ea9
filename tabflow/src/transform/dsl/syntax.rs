//! Textual action and pick syntax used on the command line.
//!
//! ```text
//! name:fields[:options]
//!
//! fields  = field ("," field)*        field  = target "=" source | name
//! options = option ("," option)*      option = key "=" value | flag
//! ```
//!
//! List-valued sources (array members, id columns) separate items with `+`.
//! A backslash escapes the delimiters (`\,` `\:` `\=`) and spells control
//! characters (`\n` `\t` `\r` `\\`).

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};

use super::actions::{Action, ArrayMember, FilterOp, LiteralType, RequiredPolicy};
use super::config::PickConfig;

/// Default separator between action name, fields and options.
pub const DEFAULT_ACTION_DELIMITER: char = ':';

const LIST_SEPARATOR: char = '+';

/// A `target=source` pair, or a bare name used as both.
#[derive(Debug, Clone, PartialEq)]
struct FieldSpec {
    target: String,
    source: String,
    bare: bool,
}

/// Parsed `key=value` / flag options, in declaration order.
#[derive(Debug, Default)]
struct Options {
    entries: Vec<(String, Option<String>)>,
}

impl Options {
    fn parse(text: &str, input: &str) -> ConfigResult<Self> {
        let mut entries = Vec::new();
        for raw in split_unescaped(text, ',') {
            if raw.trim().is_empty() {
                continue;
            }
            let entry = match split_once_unescaped(&raw, '=') {
                Some((key, value)) => (unescape(key.trim()), Some(unescape(value.trim()))),
                None => (unescape(raw.trim()), None),
            };
            if entry.0.is_empty() {
                return Err(malformed(input, "option name is empty"));
            }
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// A bare flag is `true`; `key=value` must spell a boolean.
    fn flag(&self, action: &str, key: &str) -> ConfigResult<bool> {
        match self.entries.iter().find(|(k, _)| k == key) {
            None => Ok(false),
            Some((_, None)) => Ok(true),
            Some((_, Some(value))) => match value.to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(invalid_option(action, key, "expected a boolean")),
            },
        }
    }

    /// Reject options the action does not understand.
    fn allow_only(&self, action: &str, allowed: &[&str]) -> ConfigResult<()> {
        for (key, _) in &self.entries {
            if !allowed.contains(&key.as_str()) {
                return Err(invalid_option(action, key, "unknown option"));
            }
        }
        Ok(())
    }
}

/// Parse one action specification; each field yields one action.
pub fn parse_action(input: &str, delimiter: char) -> ConfigResult<Vec<Action>> {
    let parts = split_unescaped(input, delimiter);
    if parts.len() != 2 && parts.len() != 3 {
        return Err(malformed(
            input,
            &format!("expected 2 or 3 '{}'-separated parts", delimiter),
        ));
    }

    let name = parts[0].trim();
    let fields = parse_fields(&parts[1], input)?;
    let options = match parts.get(2) {
        Some(text) => Options::parse(text, input)?,
        None => Options::default(),
    };

    let mut actions = Vec::with_capacity(fields.len());
    for field in fields {
        let action = build_action(name, field, &options, input)?;
        action.validate()?;
        actions.push(action);
    }
    Ok(actions)
}

/// Parse every specification in order.
pub fn parse_actions(inputs: &[String], delimiter: char) -> ConfigResult<Vec<Action>> {
    let mut actions = Vec::new();
    for input in inputs {
        actions.extend(parse_action(input, delimiter)?);
    }
    Ok(actions)
}

/// Parse `target=source[,target=source...]` pick specifications.
pub fn parse_picks(inputs: &[String]) -> ConfigResult<Vec<PickConfig>> {
    let mut picks = Vec::new();
    for input in inputs {
        for field in parse_fields(input, input)? {
            picks.push(PickConfig {
                target: field.target,
                source: field.source,
            });
        }
    }
    Ok(picks)
}

fn parse_fields(text: &str, input: &str) -> ConfigResult<Vec<FieldSpec>> {
    let mut fields = Vec::new();
    for raw in split_unescaped(text, ',') {
        let field = match split_once_unescaped(&raw, '=') {
            Some((target, source)) => FieldSpec {
                target: unescape(target.trim()),
                source: unescape(source.trim()),
                bare: false,
            },
            None => {
                let name = unescape(raw.trim());
                FieldSpec {
                    target: name.clone(),
                    source: name,
                    bare: true,
                }
            }
        };
        if field.target.is_empty() || field.source.is_empty() {
            return Err(malformed(input, &format!("empty field in '{}'", raw.trim())));
        }
        fields.push(field);
    }
    if fields.is_empty() {
        return Err(malformed(input, "no fields given"));
    }
    Ok(fields)
}

fn build_action(name: &str, field: FieldSpec, options: &Options, input: &str) -> ConfigResult<Action> {
    let FieldSpec {
        target,
        source,
        bare,
    } = field;

    let action = match name {
        "assign-constant" => {
            options.allow_only(name, &["type"])?;
            let value_type = options.value("type").unwrap_or("str").parse::<LiteralType>()?;
            Action::AssignConstant {
                target,
                value: Value::String(source),
                value_type: Some(value_type),
            }
        }
        "assign" => {
            options.allow_only(name, &["required", "default", "policy"])?;
            let required_policy = match options.value("policy") {
                Some(policy) => policy.parse::<RequiredPolicy>()?,
                None => RequiredPolicy::default(),
            };
            Action::Assign {
                target,
                source,
                required: options.flag(name, "required")?,
                assign_default: options.has("default"),
                default_value: options
                    .value("default")
                    .map(|v| Value::String(v.to_string()))
                    .unwrap_or(Value::Null),
                required_policy,
            }
        }
        "split" => {
            options.allow_only(name, &["delimiter"])?;
            Action::Split {
                target,
                source,
                delimiter: options.value("delimiter").map(String::from),
            }
        }
        "assign-array" => {
            options.allow_only(name, &["optional"])?;
            let all_optional = options.flag(name, "optional")?;
            let members = split_list(&source)
                .into_iter()
                .map(|member| match member.strip_suffix('?') {
                    Some(field) => ArrayMember::new(field, true),
                    None => ArrayMember::new(member, all_optional),
                })
                .collect();
            Action::AssignArray { target, members }
        }
        "push" => {
            options.allow_only(name, &["condition"])?;
            Action::Push {
                target,
                source,
                condition: options.value("condition").map(String::from),
            }
        }
        "assign-id" => {
            options.allow_only(name, &["context", "keep-existing"])?;
            Action::AssignId {
                target,
                primary: split_list(&source),
                context: options.value("context").map(split_list).unwrap_or_default(),
                keep_existing: options.flag(name, "keep-existing")?,
            }
        }
        "assign-length" => {
            options.allow_only(name, &[])?;
            Action::AssignLength { target, source }
        }
        "assign-format" => {
            options.allow_only(name, &[])?;
            Action::AssignFormat {
                target,
                template: source,
            }
        }
        "filter" => {
            if !bare {
                return Err(malformed(input, "filter takes source fields, not target=source"));
            }
            let (op, value) = filter_predicate(options)?;
            Action::Filter { source, op, value }
        }
        other => return Err(ConfigError::UnknownAction(other.to_string())),
    };
    Ok(action)
}

fn filter_predicate(options: &Options) -> ConfigResult<(FilterOp, Option<String>)> {
    let mut predicates = options.entries.iter();
    let (key, value) = match (predicates.next(), predicates.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(invalid_option(
                "filter",
                "predicate",
                "exactly one of equals, not-equals, matches, empty, not-empty is required",
            ))
        }
    };
    let op = key.parse::<FilterOp>()?;
    Ok((op, value.clone()))
}

fn split_list(text: &str) -> Vec<String> {
    text.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Split on `separator` unless it is escaped. Escapes are kept for
/// [`unescape`].
fn split_unescaped(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn split_once_unescaped(text: &str, separator: char) -> Option<(String, String)> {
    let mut parts = split_unescaped(text, separator).into_iter();
    let head = parts.next()?;
    let rest: Vec<String> = parts.collect();
    if rest.is_empty() {
        None
    } else {
        Some((head, rest.join(&separator.to_string())))
    }
}

/// Resolve backslash escapes. Unknown escapes are kept verbatim.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(c @ (',' | ':' | '=' | '+')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn malformed(input: &str, message: &str) -> ConfigError {
    ConfigError::Malformed {
        input: input.to_string(),
        message: message.to_string(),
    }
}

fn invalid_option(action: &str, option: &str, message: &str) -> ConfigError {
    ConfigError::InvalidOption {
        action: action.to_string(),
        option: option.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(input: &str) -> Action {
        let mut actions = parse_action(input, DEFAULT_ACTION_DELIMITER).unwrap();
        assert_eq!(actions.len(), 1);
        actions.remove(0)
    }

    #[test]
    fn test_split_with_escaped_newline() {
        assert_eq!(
            one(r"split:b=a:delimiter=\n"),
            Action::Split {
                target: "b".into(),
                source: "a".into(),
                delimiter: Some("\n".into()),
            }
        );
    }

    #[test]
    fn test_split_with_escaped_comma() {
        let action = one(r"split:tags=Tags:delimiter=\,");
        assert!(matches!(action, Action::Split { delimiter: Some(ref d), .. } if d == ","));
    }

    #[test]
    fn test_multiple_fields_yield_multiple_actions() {
        let actions = parse_action("assign:a=x,b", ':').unwrap();
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[1], Action::Assign { target, source, .. } if target == "b" && source == "b"));
    }

    #[test]
    fn test_assign_options() {
        let action = one("assign:t=s:required,default=None,policy=present");
        assert_eq!(
            action,
            Action::Assign {
                target: "t".into(),
                source: "s".into(),
                required: true,
                assign_default: true,
                default_value: json!("None"),
                required_policy: RequiredPolicy::Present,
            }
        );
    }

    #[test]
    fn test_assign_constant_types() {
        let action = one("assign-constant:n=3:type=int");
        assert!(matches!(
            action,
            Action::AssignConstant { value_type: Some(LiteralType::Integer), .. }
        ));
        assert!(matches!(
            parse_action("assign-constant:n=3:type=date", ':'),
            Err(ConfigError::UnsupportedType(_))
        ));
        assert!(parse_action("assign-constant:n=abc:type=int", ':').is_err());
    }

    #[test]
    fn test_list_fields() {
        assert_eq!(
            one("assign-array:people=author+editor?+translator:optional=false"),
            Action::AssignArray {
                target: "people".into(),
                members: vec![
                    ArrayMember::new("author", false),
                    ArrayMember::new("editor", true),
                    ArrayMember::new("translator", false),
                ],
            }
        );
        assert_eq!(
            one("assign-id:id=title+year:context=category,keep-existing"),
            Action::AssignId {
                target: "id".into(),
                primary: vec!["title".into(), "year".into()],
                context: vec!["category".into()],
                keep_existing: true,
            }
        );
    }

    #[test]
    fn test_filter_syntax() {
        assert_eq!(
            one("filter:status:equals=active"),
            Action::Filter {
                source: "status".into(),
                op: FilterOp::Equals,
                value: Some("active".into()),
            }
        );
        assert!(matches!(
            one("filter:note:not-empty"),
            Action::Filter { op: FilterOp::NotEmpty, value: None, .. }
        ));
        assert!(parse_action("filter:a=b:empty", ':').is_err());
        assert!(parse_action("filter:a:empty,not-empty", ':').is_err());
        assert!(parse_action("filter:a:matches=(", ':').is_err());
    }

    #[test]
    fn test_assign_format_with_escaped_comma() {
        let action = one(r"assign-format:label={last}\, {first}");
        assert!(matches!(action, Action::AssignFormat { ref template, .. } if template == "{last}, {first}"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_action("rename:a=b", ':'), Err(ConfigError::UnknownAction(_))));
        assert!(matches!(parse_action("assign", ':'), Err(ConfigError::Malformed { .. })));
        assert!(matches!(parse_action("assign:a:b:c", ':'), Err(ConfigError::Malformed { .. })));
        assert!(matches!(parse_action("assign:=b", ':'), Err(ConfigError::Malformed { .. })));
        assert!(matches!(
            parse_action("split:a:bogus", ':'),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_custom_delimiter() {
        let actions = parse_action("split|b=a|delimiter=:", '|').unwrap();
        assert!(matches!(&actions[0], Action::Split { delimiter: Some(d), .. } if d == ":"));
    }

    #[test]
    fn test_parse_picks() {
        let picks = parse_picks(&["title=staging.name,year".to_string()]).unwrap();
        assert_eq!(
            picks,
            vec![
                PickConfig {
                    target: "title".into(),
                    source: "staging.name".into()
                },
                PickConfig {
                    target: "year".into(),
                    source: "year".into()
                },
            ]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\tb\\c\d"), "a\tb\\c\\d");
    }
}
