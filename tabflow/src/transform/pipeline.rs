//! Conversion driver.
//!
//! Streams every input file row by row through the configured pre-stage
//! transforms, actions and projection, and hands the survivors to a writer:
//!
//! ```text
//! loader → stamp bookkeeping → pre-stage → actions → project → strip staging → writer
//!                                            └─ Filtered ─→ filtered-out writer
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use tabflow::io::FormatRegistry;
//! use tabflow::transform::pipeline::{convert, ConvertOptions};
//!
//! let mut options = ConvertOptions::new("works.json");
//! options.actions.push("assign-id:id=title".to_string());
//!
//! let report = convert(&[PathBuf::from("catalog.csv")], &options, &FormatRegistry::builtin())?;
//! println!("{} rows written", report.rows_written);
//! # Ok::<(), tabflow::error::ConvertError>(())
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::{ConfigResult, ConvertError, ConvertResult, RowResult};
use crate::io::{FormatRegistry, LoadOptions, Writer};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::models::{Row, FILE_FIELD, FILE_ROW_INDEX_FIELD, ROW_INDEX_FIELD};

use super::dsl::{
    parse_actions, parse_picks, run_actions, Action, ActionOutcome, ConvertConfig,
    DEFAULT_ACTION_DELIMITER,
};
use super::ids::IdAllocator;
use super::projector::project;

/// Options for one conversion run
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Output file; its extension selects the writer
    pub output: PathBuf,

    /// Where filtered rows go; dropped silently when `None`
    pub filtered_out: Option<PathBuf>,

    /// Configuration document
    pub config: Option<PathBuf>,

    /// Extra actions in `name:fields[:options]` form, run after the
    /// configured ones
    pub actions: Vec<String>,

    /// Extra picks (`target=source` or `field`)
    pub picks: Vec<String>,

    /// Separator between the parts of an action spec
    pub action_delimiter: char,

    /// Keep the staging namespace in the output
    pub output_debug: bool,

    /// `<file>:<index>` or `<basename>:<index>` tokens of rows to skip
    pub ignore_rows: HashSet<String>,

    pub load: LoadOptions,
}

impl ConvertOptions {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            filtered_out: None,
            config: None,
            actions: Vec::new(),
            picks: Vec::new(),
            action_delimiter: DEFAULT_ACTION_DELIMITER,
            output_debug: false,
            ignore_rows: HashSet::new(),
            load: LoadOptions::default(),
        }
    }

    /// The configuration file (if any) with command-line picks and actions
    /// appended.
    pub fn build_config(&self) -> ConfigResult<ConvertConfig> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::from_path(path)?,
            None => ConvertConfig::new(),
        };
        let picks = parse_picks(&self.picks)?;
        let actions = parse_actions(&self.actions, self.action_delimiter)?;
        config.extend(picks, actions);
        config.validate()?;
        Ok(config)
    }

    fn is_ignored(&self, file: &str, base_name: &str, index: usize) -> bool {
        !self.ignore_rows.is_empty()
            && (self.ignore_rows.contains(&format!("{}:{}", file, index))
                || self.ignore_rows.contains(&format!("{}:{}", base_name, index)))
    }
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// The projected row to emit
    Emit(Row),
    /// An action dropped the row; the input row holds its final state
    Filtered,
}

/// Counters and id state of a finished run
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_filtered: usize,
    pub rows_ignored: usize,
    pub ids: IdAllocator,
}

// =============================================================================
// Converter
// =============================================================================

/// Per-row conversion with run-scoped id state.
#[derive(Debug)]
pub struct Converter {
    config: ConvertConfig,
    pre_stage: Vec<Action>,
    ids: IdAllocator,
    output_debug: bool,
}

impl Converter {
    pub fn new(config: ConvertConfig, output_debug: bool) -> Self {
        let pre_stage = config.process.to_actions();
        Self {
            config,
            pre_stage,
            ids: IdAllocator::new(),
            output_debug,
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn into_ids(self) -> IdAllocator {
        self.ids
    }

    /// Record where the row came from, plus a snapshot of its original
    /// content. Rows that already carry staging data are left alone.
    ///
    /// Returns whether the row was stamped.
    pub fn stamp_row(row: &mut Row, file: &str, index: usize) -> RowResult<bool> {
        if row.has_staging() {
            return Ok(false);
        }
        let snapshot = row.flat().clone();
        row.set_staging(FILE_FIELD, json!(file))?;
        row.set_staging(ROW_INDEX_FIELD, json!(index))?;
        row.set_staging(FILE_ROW_INDEX_FIELD, json!(format!("{}:{}", file, index)))?;
        row.set_input_snapshot(snapshot);
        Ok(true)
    }

    /// Run pre-stage transforms, actions and projection on one row.
    ///
    /// On `Filtered` and on error, `row` is left in its last state (staging
    /// stripped for filtered rows unless in debug mode).
    pub fn process_row(&mut self, row: &mut Row) -> ConvertResult<RowOutcome> {
        run_actions(&self.pre_stage, row, &mut self.ids)?;

        if run_actions(&self.config.actions, row, &mut self.ids)? == ActionOutcome::Filtered {
            if !self.output_debug {
                row.pop_staging();
            }
            return Ok(RowOutcome::Filtered);
        }

        let mut projected = project(row, &self.config.pick)?;
        if !self.output_debug {
            projected.pop_staging();
        }
        Ok(RowOutcome::Emit(projected))
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Convert `inputs` into `options.output`.
///
/// Files are processed in order, rows in source order. The first error aborts
/// the run; writers are closed either way.
pub fn convert(
    inputs: &[PathBuf],
    options: &ConvertOptions,
    registry: &FormatRegistry,
) -> ConvertResult<ConversionReport> {
    if inputs.is_empty() {
        return Err(ConvertError::EmptyInput);
    }

    let config = options.build_config()?;
    log_info(format!(
        "{} action(s), {} pick(s)",
        config.process.to_actions().len() + config.actions.len(),
        config.pick.len()
    ));

    let mut writer = registry.create_writer(&options.output)?;
    let mut filtered_writer = match &options.filtered_out {
        Some(path) => match registry.create_writer(path) {
            Ok(w) => Some(w),
            Err(e) => {
                close_writer(writer.as_mut(), &options.output);
                return Err(e.into());
            }
        },
        None => None,
    };

    let mut converter = Converter::new(config, options.output_debug);
    let mut report = ConversionReport::default();

    let result = run_inputs(
        inputs,
        options,
        registry,
        &mut converter,
        &mut writer,
        &mut filtered_writer,
        &mut report,
    );

    let closed = writer.close();
    if let (Some(filtered), Some(path)) = (filtered_writer.as_mut(), &options.filtered_out) {
        close_writer(filtered.as_mut(), path);
    }
    result?;
    closed?;

    report.ids = converter.into_ids();
    log_success(format!(
        "{} row(s) written to {}",
        report.rows_written,
        options.output.display()
    ));
    if report.rows_filtered > 0 {
        log_info(format!("{} row(s) filtered out", report.rows_filtered));
    }
    if report.rows_ignored > 0 {
        log_info(format!("{} row(s) ignored", report.rows_ignored));
    }
    Ok(report)
}

fn run_inputs(
    inputs: &[PathBuf],
    options: &ConvertOptions,
    registry: &FormatRegistry,
    converter: &mut Converter,
    writer: &mut Box<dyn Writer>,
    filtered_writer: &mut Option<Box<dyn Writer>>,
    report: &mut ConversionReport,
) -> ConvertResult<()> {
    for input in inputs {
        let file = input.display().to_string();
        let base_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());

        let mut loader = registry.open_loader(input, &options.load)?;
        log_info(format!(
            "Reading {} ({}, {} rows)",
            file,
            loader.format(),
            loader.len()?
        ));

        for (index, row) in loader.iter().enumerate() {
            let mut row = row?;
            report.rows_read += 1;

            if options.is_ignored(&file, &base_name, index) {
                report.rows_ignored += 1;
                continue;
            }

            Converter::stamp_row(&mut row, &file, index)?;

            match converter.process_row(&mut row) {
                Ok(RowOutcome::Emit(projected)) => {
                    writer.push_row(projected)?;
                    report.rows_written += 1;
                }
                Ok(RowOutcome::Filtered) => {
                    tracing::debug!(file = %file, index, "row filtered out");
                    report.rows_filtered += 1;
                    if let Some(filtered) = filtered_writer.as_mut() {
                        filtered.push_row(row)?;
                    }
                }
                Err(e) => {
                    log_error(format!(
                        "Row {} of {} failed: {}",
                        index,
                        file,
                        Value::Object(row.flat().clone())
                    ));
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

fn close_writer(writer: &mut dyn Writer, path: &Path) {
    if let Err(e) = writer.close() {
        log_warning(format!("Failed to close {}: {}", path.display(), e));
    }
}
