//! A JSON document holding an array of records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use crate::error::{FormatError, FormatResult};
use crate::models::Row;

use super::{LoadOptions, RowStream, Writer};

/// Load a top-level array of objects.
pub fn load(path: &Path, _options: &LoadOptions) -> FormatResult<RowStream> {
    let text = std::fs::read_to_string(path)?;
    let records = match serde_json::from_str(&text)? {
        Value::Array(records) => records,
        other => {
            return Err(FormatError::InvalidData {
                source_name: path.display().to_string(),
                message: format!("expected an array of records, found {}", kind_name(&other)),
            })
        }
    };
    Ok(Box::new(
        records
            .into_iter()
            .map(|record| -> FormatResult<Row> { Ok(Row::from_value(record)?) }),
    ))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Buffers every row and writes their nested views as one pretty-printed
/// array on close.
pub struct JsonWriter {
    file: Option<File>,
    records: Vec<Value>,
}

impl JsonWriter {
    pub fn new(path: &Path) -> FormatResult<Self> {
        Ok(Self {
            file: Some(File::create(path)?),
            records: Vec::new(),
        })
    }

    pub fn create(path: &Path) -> FormatResult<Box<dyn Writer>> {
        Ok(Box::new(Self::new(path)?))
    }
}

impl Writer for JsonWriter {
    fn push_row(&mut self, row: Row) -> FormatResult<()> {
        self.records.push(row.to_nested_value());
        Ok(())
    }

    fn close(&mut self) -> FormatResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let mut out = BufWriter::new(file);
        let records = Value::Array(std::mem::take(&mut self.records));
        serde_json::to_writer_pretty(&mut out, &records)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}
