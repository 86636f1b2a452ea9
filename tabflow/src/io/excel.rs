//! `.xlsx` workbooks.
//!
//! Reading uses the first sheet only. Writing buffers rows and lays out one
//! sheet on close.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use serde_json::{Map, Value};

use crate::error::{FormatError, FormatResult};
use crate::models::{to_text, Row};

use super::{LoadOptions, RowStream, Writer};

/// Integral floats below this magnitude render without a fraction.
const MAX_EXACT_INTEGER: f64 = 9.0e15;

fn excel_error(err: impl std::fmt::Display) -> FormatError {
    FormatError::Excel(err.to_string())
}

/// Load the first sheet of a workbook.
pub fn load(path: &Path, options: &LoadOptions) -> FormatResult<RowStream> {
    let mut workbook = open_workbook_auto(path).map_err(excel_error)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Box::new(std::iter::empty()));
    };
    let range = workbook.worksheet_range(&sheet).map_err(excel_error)?;
    tracing::debug!(source = %path.display(), sheet = %sheet, "reading worksheet");

    let mut cells = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect::<Vec<Value>>())
        .filter(|row| row.iter().any(|cell| !cell.is_null()));

    let headers: Option<Vec<String>> = if options.no_header {
        None
    } else {
        cells
            .next()
            .map(|row| row.iter().map(|cell| to_text(cell).trim().to_string()).collect())
    };

    let mut rows = Vec::new();
    for row in cells {
        let mut flat = Map::new();
        match &headers {
            Some(headers) => {
                for (i, header) in headers.iter().enumerate() {
                    let cell = row.get(i).cloned().unwrap_or(Value::Null);
                    flat.insert(header.clone(), cell);
                }
            }
            None => {
                for (i, cell) in row.into_iter().enumerate() {
                    flat.insert(i.to_string(), cell);
                }
            }
        }
        rows.push(Row::from_flat(flat).map_err(FormatError::from));
    }
    Ok(Box::new(rows.into_iter()))
}

/// Convert one cell to a string value; empty cells become null.
fn cell_value(cell: &Data) -> Value {
    let text = match cell {
        Data::Empty => return Value::Null,
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
    };
    Value::String(text)
}

/// Buffers rows and writes a single-sheet workbook on close.
///
/// The header row is the union of every row's flat keys in first-seen order.
pub struct ExcelWriter {
    path: PathBuf,
    rows: Vec<Map<String, Value>>,
    closed: bool,
}

impl ExcelWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            rows: Vec::new(),
            closed: false,
        }
    }

    pub fn create(path: &Path) -> FormatResult<Box<dyn Writer>> {
        Ok(Box::new(Self::new(path)))
    }

    fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !header.contains(key) {
                    header.push(key.clone());
                }
            }
        }
        header
    }

    fn save(&self) -> FormatResult<()> {
        let header = self.header();
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, key) in header.iter().enumerate() {
            worksheet
                .write_string(0, column_index(col)?, key)
                .map_err(excel_error)?;
        }
        for (i, row) in self.rows.iter().enumerate() {
            let line = u32::try_from(i + 1).map_err(excel_error)?;
            for (col, key) in header.iter().enumerate() {
                let col = column_index(col)?;
                match row.get(key) {
                    None | Some(Value::Null) => {}
                    Some(Value::Bool(b)) => {
                        worksheet.write_boolean(line, col, *b).map_err(excel_error)?;
                    }
                    Some(Value::Number(n)) => match n.as_f64() {
                        Some(f) => {
                            worksheet.write_number(line, col, f).map_err(excel_error)?;
                        }
                        None => {
                            worksheet
                                .write_string(line, col, n.to_string())
                                .map_err(excel_error)?;
                        }
                    },
                    Some(other) => {
                        worksheet
                            .write_string(line, col, to_text(other))
                            .map_err(excel_error)?;
                    }
                }
            }
        }
        workbook.save(&self.path).map_err(excel_error)?;
        Ok(())
    }
}

fn column_index(col: usize) -> FormatResult<u16> {
    u16::try_from(col).map_err(excel_error)
}

impl Writer for ExcelWriter {
    fn push_row(&mut self, row: Row) -> FormatResult<()> {
        self.rows.push(row.into_flat());
        Ok(())
    }

    fn close(&mut self) -> FormatResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.save()
    }
}
