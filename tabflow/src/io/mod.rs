//! Loaders and writers for tabular files.
//!
//! This module provides:
//! - `csv`: Delimited text with encoding and delimiter detection
//! - `json`: A top-level JSON array of records
//! - `jsonl`: One JSON record per line
//! - `excel`: `.xlsx` workbooks (feature `excel`)
//!
//! The conversion driver never looks at file extensions itself: it asks a
//! [`FormatRegistry`] for a [`Loader`] per input and a [`Writer`] for the
//! output.

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod json;
pub mod jsonl;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{FormatError, FormatResult};
use crate::models::Row;

pub use self::csv::{decode_content, detect_delimiter, detect_encoding};

/// File formats known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Csv,
    Json,
    JsonLines,
    #[cfg(feature = "excel")]
    Excel,
}

impl Format {
    /// Pick a format from the (case-insensitive) file extension.
    pub fn from_path(path: &Path) -> FormatResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "jsonl" | "ndjson" => Ok(Format::JsonLines),
            #[cfg(feature = "excel")]
            "xlsx" => Ok(Format::Excel),
            "" => Err(FormatError::UnsupportedFormat(path.display().to_string())),
            other => Err(FormatError::UnsupportedFormat(format!(".{}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::JsonLines => "jsonl",
            #[cfg(feature = "excel")]
            Format::Excel => "xlsx",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options forwarded to every loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    /// First record is data; columns are named `0`, `1`, ...
    pub no_header: bool,
    /// Field delimiter for delimited text; detected when `None`.
    pub delimiter: Option<char>,
}

/// Lazily produced rows of one source.
pub type RowStream = Box<dyn Iterator<Item = FormatResult<Row>>>;

/// Opens a source as a row stream.
pub type LoadFn = fn(&Path, &LoadOptions) -> FormatResult<RowStream>;

/// Creates a writer for an output path.
pub type WriterFactory = fn(&Path) -> FormatResult<Box<dyn Writer>>;

/// Sink for converted rows.
///
/// `close` finalizes the output and must be safe to call more than once.
pub trait Writer {
    fn push_row(&mut self, row: Row) -> FormatResult<()>;

    fn close(&mut self) -> FormatResult<()>;
}

// =============================================================================
// Loader
// =============================================================================

/// Rows of one source, read lazily and cached once read.
pub struct Loader {
    source: PathBuf,
    format: Format,
    stream: Option<RowStream>,
    cache: Vec<Row>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("source", &self.source)
            .field("format", &self.format)
            .field("cached", &self.cache.len())
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl Loader {
    pub fn new(source: impl Into<PathBuf>, format: Format, stream: RowStream) -> Self {
        Self {
            source: source.into(),
            format,
            stream: Some(stream),
            cache: Vec::new(),
        }
    }

    /// Detected format tag of the source.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// True once the source has been read to the end.
    pub fn is_complete(&self) -> bool {
        self.stream.is_none()
    }

    /// Iterate the rows, reading the source only as far as needed.
    ///
    /// A second traversal is served from the cache.
    pub fn iter(&mut self) -> LoaderIter<'_> {
        LoaderIter {
            loader: self,
            position: 0,
        }
    }

    /// Number of rows. Reads the rest of the source if needed.
    pub fn len(&mut self) -> FormatResult<usize> {
        while let Some(stream) = self.stream.as_mut() {
            match stream.next() {
                Some(row) => self.cache.push(row?),
                None => self.stream = None,
            }
        }
        Ok(self.cache.len())
    }

    pub fn is_empty(&mut self) -> FormatResult<bool> {
        Ok(self.len()? == 0)
    }

    fn row_at(&mut self, position: usize) -> Option<FormatResult<Row>> {
        if let Some(row) = self.cache.get(position) {
            return Some(Ok(row.clone()));
        }
        let stream = self.stream.as_mut()?;
        match stream.next() {
            Some(Ok(row)) => {
                self.cache.push(row.clone());
                Some(Ok(row))
            }
            Some(Err(e)) => {
                self.stream = None;
                Some(Err(e))
            }
            None => {
                self.stream = None;
                None
            }
        }
    }
}

/// Iterator over a [`Loader`]'s rows.
pub struct LoaderIter<'a> {
    loader: &'a mut Loader,
    position: usize,
}

impl Iterator for LoaderIter<'_> {
    type Item = FormatResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.loader.row_at(self.position)?;
        self.position += 1;
        Some(row)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Extension-driven table of loaders and writers.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    loaders: HashMap<Format, LoadFn>,
    writers: HashMap<Format, WriterFactory>,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("loaders", &self.loaders.keys().collect::<Vec<_>>())
            .field("writers", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every format compiled into this build.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_loader(Format::Csv, csv::load);
        registry.register_writer(Format::Csv, csv::CsvWriter::create);
        registry.register_loader(Format::Json, json::load);
        registry.register_writer(Format::Json, json::JsonWriter::create);
        registry.register_loader(Format::JsonLines, jsonl::load);
        registry.register_writer(Format::JsonLines, jsonl::JsonLinesWriter::create);
        #[cfg(feature = "excel")]
        {
            registry.register_loader(Format::Excel, excel::load);
            registry.register_writer(Format::Excel, excel::ExcelWriter::create);
        }
        registry
    }

    pub fn register_loader(&mut self, format: Format, load: LoadFn) {
        self.loaders.insert(format, load);
    }

    pub fn register_writer(&mut self, format: Format, factory: WriterFactory) {
        self.writers.insert(format, factory);
    }

    /// Open `path` with the loader registered for its extension.
    pub fn open_loader(&self, path: &Path, options: &LoadOptions) -> FormatResult<Loader> {
        let format = Format::from_path(path)?;
        let load = self
            .loaders
            .get(&format)
            .ok_or_else(|| FormatError::UnsupportedFormat(format.to_string()))?;
        if !path.exists() {
            return Err(FormatError::FileNotFound(path.to_path_buf()));
        }
        let stream = load(path, options)?;
        tracing::debug!(source = %path.display(), format = %format, "opened loader");
        Ok(Loader::new(path, format, stream))
    }

    /// Create the writer registered for the extension of `path`.
    pub fn create_writer(&self, path: &Path) -> FormatResult<Box<dyn Writer>> {
        let format = Format::from_path(path)?;
        let factory = self
            .writers
            .get(&format)
            .ok_or_else(|| FormatError::UnsupportedFormat(format.to_string()))?;
        factory(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream(values: Vec<FormatResult<Row>>) -> RowStream {
        Box::new(values.into_iter())
    }

    fn row(value: serde_json::Value) -> Row {
        Row::from_value(value).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a.csv")).unwrap(), Format::Csv);
        assert_eq!(Format::from_path(Path::new("a.JSON")).unwrap(), Format::Json);
        assert_eq!(
            Format::from_path(Path::new("dir/a.ndjson")).unwrap(),
            Format::JsonLines
        );
        assert!(matches!(
            Format::from_path(Path::new("a.txt")),
            Err(FormatError::UnsupportedFormat(ext)) if ext == ".txt"
        ));
        assert!(matches!(
            Format::from_path(Path::new("noext")),
            Err(FormatError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_loader_caches_after_first_pass() {
        let mut loader = Loader::new(
            "mem.json",
            Format::Json,
            stream(vec![Ok(row(json!({"a": 1}))), Ok(row(json!({"a": 2})))]),
        );
        assert!(!loader.is_complete());

        let first: Vec<Row> = loader.iter().map(Result::unwrap).collect();
        assert!(loader.is_complete());
        let second: Vec<Row> = loader.iter().map(Result::unwrap).collect();
        assert_eq!(first, second);
        assert_eq!(loader.len().unwrap(), 2);
        assert_eq!(loader.format(), Format::Json);
    }

    #[test]
    fn test_len_materializes() {
        let mut loader = Loader::new(
            "mem.jsonl",
            Format::JsonLines,
            stream(vec![Ok(row(json!({"a": 1})))]),
        );
        assert_eq!(loader.len().unwrap(), 1);
        assert!(loader.is_complete());
        assert_eq!(loader.iter().count(), 1);
    }

    #[test]
    fn test_stream_error_ends_iteration() {
        let mut loader = Loader::new(
            "mem.jsonl",
            Format::JsonLines,
            stream(vec![
                Ok(row(json!({"a": 1}))),
                Err(FormatError::Encoding("bad".into())),
                Ok(row(json!({"a": 3}))),
            ]),
        );
        let results: Vec<FormatResult<Row>> = loader.iter().collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_registry_rejects_missing_and_unknown() {
        let registry = FormatRegistry::builtin();
        let options = LoadOptions::default();
        assert!(matches!(
            registry.open_loader(Path::new("/nonexistent/input.csv"), &options),
            Err(FormatError::FileNotFound(_))
        ));
        assert!(matches!(
            registry.open_loader(Path::new("input.parquet"), &options),
            Err(FormatError::UnsupportedFormat(_))
        ));

        let empty = FormatRegistry::new();
        assert!(matches!(
            empty.create_writer(Path::new("out.csv")),
            Err(FormatError::UnsupportedFormat(_))
        ));
    }
}
