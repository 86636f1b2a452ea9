//! JSON Lines: one record per line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use crate::error::{FormatError, FormatResult};
use crate::models::Row;

use super::{LoadOptions, RowStream, Writer};

/// Load one object per non-blank line.
pub fn load(path: &Path, _options: &LoadOptions) -> FormatResult<RowStream> {
    let source_name = path.display().to_string();
    let lines = BufReader::new(File::open(path)?).lines().enumerate();

    let rows = lines.filter_map(move |(index, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(FormatError::Io(e))),
        };
        if line.trim().is_empty() {
            return None;
        }
        Some(parse_line(&source_name, index + 1, &line))
    });
    Ok(Box::new(rows))
}

fn parse_line(source_name: &str, line_number: usize, line: &str) -> FormatResult<Row> {
    let invalid = |message: String| FormatError::InvalidData {
        source_name: format!("{}:{}", source_name, line_number),
        message,
    };
    let value: Value = serde_json::from_str(line).map_err(|e| invalid(e.to_string()))?;
    Row::from_value(value).map_err(|e| invalid(e.to_string()))
}

/// Streams each row's flat view as one line.
pub struct JsonLinesWriter {
    out: BufWriter<File>,
    closed: bool,
}

impl JsonLinesWriter {
    pub fn new(path: &Path) -> FormatResult<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            closed: false,
        })
    }

    pub fn create(path: &Path) -> FormatResult<Box<dyn Writer>> {
        Ok(Box::new(Self::new(path)?))
    }
}

impl Writer for JsonLinesWriter {
    fn push_row(&mut self, row: Row) -> FormatResult<()> {
        serde_json::to_writer(&mut self.out, row.flat())?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) -> FormatResult<()> {
        if !self.closed {
            self.closed = true;
            self.out.flush()?;
        }
        Ok(())
    }
}
