//! Error types for the tabflow conversion engine.
//!
//! One error enum per layer:
//!
//! - [`RowError`] - Row mutation errors
//! - [`ConfigError`] - Action / pick / configuration document errors
//! - [`FormatError`] - Loader and writer errors
//! - [`ActionError`] - Per-row action failures (fatal for the run)
//! - [`ConvertError`] - Top-level conversion errors
//!
//! Lower layers convert into higher ones via `From`, so `?` works across
//! layer boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Row Errors
// =============================================================================

/// Errors raised while mutating a [`crate::models::Row`].
#[derive(Debug, Error)]
pub enum RowError {
    /// Object expansion on write nested deeper than the guard allows.
    #[error("Nested object too deep at '{path}' (limit {limit})")]
    DepthExceeded { path: String, limit: usize },

    /// A record that must be an object was something else.
    #[error("Record is not a JSON object: {0}")]
    NotAnObject(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in action, pick or configuration-document syntax.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Action name not known to the mini-language.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Action / pick / option text could not be parsed.
    #[error("Malformed specification '{input}': {message}")]
    Malformed { input: String, message: String },

    /// Literal type name not supported by `assign-constant`.
    #[error("Unsupported literal type: {0}")]
    UnsupportedType(String),

    /// An option had an unusable value.
    #[error("Invalid option '{option}' for action '{action}': {message}")]
    InvalidOption {
        action: String,
        option: String,
        message: String,
    },

    /// A regular expression did not compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Failed to read the configuration file.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration document is not valid JSON for the expected shape.
    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Format Errors
// =============================================================================

/// Errors from loaders and writers.
#[derive(Debug, Error)]
pub enum FormatError {
    /// No loader/writer registered for the extension.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Input file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Text could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Source content does not have the expected shape.
    #[error("Invalid data in {source_name}: {message}")]
    InvalidData { source_name: String, message: String },

    /// A loaded record could not become a row.
    #[error("Invalid record: {0}")]
    Row(#[from] RowError),

    /// Spreadsheet reader/writer error.
    #[cfg(feature = "excel")]
    #[error("Spreadsheet error: {0}")]
    Excel(String),
}

// =============================================================================
// Action Errors
// =============================================================================

/// Errors raised while applying actions to a row.
///
/// Every variant aborts the run; a filtered row is not an error.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A required source path could not be resolved.
    #[error("Missing field '{field}': {detail}")]
    MissingField { field: String, detail: String },

    /// Explicit id registration conflicts with an existing mapping.
    #[error("Id collision: id {id} in context {context}: {detail}")]
    IdCollision {
        id: u64,
        context: String,
        detail: String,
    },

    /// Row mutation failed.
    #[error(transparent)]
    Row(#[from] RowError),

    /// Action configuration was unusable at apply time.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level conversion errors.
///
/// This is the error type returned by [`crate::transform::pipeline::convert`].
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Loader / writer error.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Action error.
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// Row error.
    #[error("Row error: {0}")]
    Row(#[from] RowError),

    /// Nothing to convert.
    #[error("No input files given")]
    EmptyInput,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for row operations.
pub type RowResult<T> = Result<T, RowError>;

/// Result type for configuration parsing.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for loaders and writers.
pub type FormatResult<T> = Result<T, FormatError>;

/// Result type for actions.
pub type ActionResult<T> = Result<T, ActionError>;

/// Result type for a conversion run.
pub type ConvertResult<T> = Result<T, ConvertError>;
