//! Row data model.
//!
//! - [`Row`] - A record with synchronized flat and nested views
//! - [`ValueKind`] - Scalar / sequence / object classification
//! - [`path`] - Dotted path resolution over nested trees

pub mod path;
pub mod row;
pub mod value;

pub use row::{
    input_path, staging_path, Row, FILE_FIELD, FILE_ROW_INDEX_FIELD, INPUT_FIELD, MAX_SET_DEPTH,
    ROW_INDEX_FIELD, STAGING_FIELD,
};
pub use value::{flatten, is_truthy, nest, to_text, ValueKind};
