//! Row action language
//!
//! This module provides:
//! - `actions`: The typed action set and per-action semantics
//! - `config`: The JSON configuration document
//! - `syntax`: The `name:fields[:options]` command-line syntax
//! - `executor`: Run an action list against a row
//!
//! ## Usage Flow
//!
//! ```text
//! config file ─┐
//!              ├→ ConvertConfig → run_actions(row) → Keep | Filtered
//! --do specs  ─┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use tabflow::models::Row;
//! use tabflow::transform::dsl::{parse_action, run_actions};
//! use tabflow::transform::IdAllocator;
//!
//! let actions = parse_action(r"split:b=a:delimiter=\n", ':').unwrap();
//! let mut row = Row::from_value(serde_json::json!({"a": "1\n2\n3"})).unwrap();
//! let mut ids = IdAllocator::new();
//! run_actions(&actions, &mut row, &mut ids).unwrap();
//!
//! assert_eq!(row.get_path("staging.b"), Some(&serde_json::json!(["1", "2", "3"])));
//! ```

pub mod actions;
pub mod config;
pub mod executor;
pub mod syntax;

// Re-exports for convenience
pub use actions::{
    actions_description, Action, ActionOutcome, ArrayMember, FilterOp, LiteralType,
    RequiredPolicy,
};
pub use config::{example_config, ConvertConfig, PickConfig, ProcessConfig, PushConfig};
pub use executor::run_actions;
pub use syntax::{parse_action, parse_actions, parse_picks, DEFAULT_ACTION_DELIMITER};
