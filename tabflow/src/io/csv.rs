//! Delimited text with encoding and delimiter auto-detection.
//!
//! Every cell loads as a string. Column headers become row paths, so a
//! dotted header such as `meta.title` loads nested.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{FormatError, FormatResult};
use crate::logs::log_warning;
use crate::models::{to_text, Row};

use super::{LoadOptions, RowStream, Writer};

/// Delimiters tried by [`detect_delimiter`], in tie-break order.
const CANDIDATE_DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding; unknown encodings fall back to
/// lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let text = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = CANDIDATE_DELIMITERS[0];
    let mut best_count = 0;
    for sep in CANDIDATE_DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Load a delimited file.
pub fn load(path: &Path, options: &LoadOptions) -> FormatResult<RowStream> {
    let bytes = std::fs::read(path)?;
    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding);
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));
    tracing::debug!(
        source = %path.display(),
        encoding = %encoding,
        delimiter = ?delimiter,
        "reading delimited text"
    );
    parse_content(content, delimiter, options.no_header)
}

/// Parse decoded text into a lazy row stream.
pub fn parse_content(content: String, delimiter: char, no_header: bool) -> FormatResult<RowStream> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| FormatError::InvalidData {
            source_name: "csv".to_string(),
            message: format!("delimiter {:?} is not a single ASCII character", delimiter),
        })?;

    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(!no_header)
        .flexible(true)
        .from_reader(Cursor::new(content.into_bytes()));

    let headers: Option<Vec<String>> = if no_header {
        None
    } else {
        Some(
            reader
                .headers()?
                .iter()
                .map(|header| header.trim().to_string())
                .collect(),
        )
    };

    let rows = reader.into_records().map(move |record| -> FormatResult<Row> {
        let record = record?;
        let mut flat = Map::new();
        match &headers {
            Some(headers) => {
                // Short records pad with "", extra cells are ignored.
                for (i, header) in headers.iter().enumerate() {
                    let cell = record.get(i).unwrap_or("");
                    flat.insert(header.clone(), Value::String(cell.to_string()));
                }
            }
            None => {
                for (i, cell) in record.iter().enumerate() {
                    flat.insert(i.to_string(), Value::String(cell.to_string()));
                }
            }
        }
        Ok(Row::from_flat(flat)?)
    });
    Ok(Box::new(rows))
}

// =============================================================================
// Writer
// =============================================================================

/// Streams rows as comma-separated text.
///
/// The header is the first row's flat key set; later rows are written in
/// that column order. Keys outside the header are dropped with one warning
/// per key.
pub struct CsvWriter {
    writer: ::csv::Writer<File>,
    header: Option<Vec<String>>,
    dropped: Vec<String>,
    closed: bool,
}

impl CsvWriter {
    pub fn new(path: &Path) -> FormatResult<Self> {
        Ok(Self {
            writer: ::csv::Writer::from_path(path)?,
            header: None,
            dropped: Vec::new(),
            closed: false,
        })
    }

    /// Keys seen after the header was written, in first-seen order.
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }

    pub fn create(path: &Path) -> FormatResult<Box<dyn Writer>> {
        Ok(Box::new(Self::new(path)?))
    }
}

impl Writer for CsvWriter {
    fn push_row(&mut self, row: Row) -> FormatResult<()> {
        let flat = row.flat();
        if self.header.is_none() {
            let header: Vec<String> = flat.keys().cloned().collect();
            self.writer.write_record(&header)?;
            self.header = Some(header);
        }
        let header = self.header.as_deref().unwrap_or_default();
        for key in flat.keys() {
            if !header.contains(key) && !self.dropped.contains(key) {
                log_warning(format!("Column '{}' is not in the CSV header; dropped", key));
                self.dropped.push(key.clone());
            }
        }
        let cells: Vec<String> = header
            .iter()
            .map(|key| flat.get(key).map(to_text).unwrap_or_default())
            .collect();
        self.writer.write_record(&cells)?;
        Ok(())
    }

    fn close(&mut self) -> FormatResult<()> {
        if !self.closed {
            self.closed = true;
            self.writer.flush()?;
        }
        Ok(())
    }
}
