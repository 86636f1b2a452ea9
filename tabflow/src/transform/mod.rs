//! Transformation module.
//!
//! This module turns loaded rows into output rows:
//! - DSL: Row actions, configuration and the command-line action syntax
//! - Ids: Context-scoped surrogate id allocation
//! - Projector: Output field selection
//! - Pipeline: Conversion driver

pub mod dsl;
pub mod ids;
pub mod pipeline;
pub mod projector;

pub use dsl::*;
pub use ids::{ContextKey, IdAllocator, IdMap};
pub use pipeline::*;
pub use projector::{identity_picks, project};
