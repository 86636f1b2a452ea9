//! # Tabflow - declarative conversion of tabular records
//!
//! Tabflow reads rows from CSV, JSON, JSON Lines and `.xlsx` files, runs an
//! ordered list of row actions over each one, projects the result into the
//! requested output fields and writes it back out in any of those formats.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Loader    │────▶│   Actions   │────▶│  Projector  │────▶│   Writer    │
//! │ (csv/json/…)│     │ (staging.*) │     │   (picks)   │     │ (csv/json/…)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Every row carries a `staging` namespace. Actions write their results
//! there, path lookups prefer it over the raw fields, and it is stripped
//! before output unless debug output is requested.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use tabflow::{convert, ConvertOptions, FormatRegistry};
//!
//! let mut options = ConvertOptions::new("out.jsonl");
//! options.actions = vec![r"split:tags=Tags:delimiter=\n".to_string()];
//! options.picks = vec!["title=Title".to_string(), "tags".to_string()];
//!
//! let report = convert(&[PathBuf::from("catalog.csv")], &options, &FormatRegistry::builtin())?;
//! println!("Converted {} rows", report.rows_written);
//! # Ok::<(), tabflow::ConvertError>(())
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Logging helpers
//! - [`models`] - Row, value model and path resolution
//! - [`io`] - Loaders, writers and the format registry
//! - [`transform`] - Actions, id allocation, projection and the driver

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Formats
pub mod io;

// Transformation
pub mod transform;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ActionError, ConfigError, ConvertError, FormatError, RowError,
    ActionResult, ConfigResult, ConvertResult, FormatResult, RowResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{flatten, is_truthy, nest, Row, ValueKind, STAGING_FIELD};

// =============================================================================
// Re-exports - Formats
// =============================================================================

pub use io::{
    detect_delimiter, detect_encoding, Format, FormatRegistry, LoadOptions, Loader, Writer,
};

// =============================================================================
// Re-exports - DSL
// =============================================================================

pub use transform::dsl::{
    actions_description, example_config, parse_action, parse_actions, parse_picks, run_actions,
    Action, ActionOutcome, ConvertConfig, PickConfig, ProcessConfig,
};

// =============================================================================
// Re-exports - Ids
// =============================================================================

pub use transform::ids::{ContextKey, IdAllocator};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    convert, ConversionReport, ConvertOptions, Converter, RowOutcome,
};
pub use transform::projector::project;
