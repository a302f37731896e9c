//! Delimited file reader
//!
//! [`CsvReader`] turns a character stream into typed rows. It owns the
//! physical line handling (byte-order mark, carriage returns, line numbers),
//! the header (comment skipping, repair, duplicate detection) and the column
//! types, which are either declared in the configuration or inferred from the
//! leading records.

use super::config::CsvSourceConfig;
use super::error::FileDataSourceError;
use super::parser::DelimitedRowParser;
use crate::datasource::traits::RowSource;
use crate::sql::error::SqlResult;
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::types::{DataType, FieldValue};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Physical lines of the input with one-based numbering.
struct LineReader {
    inner: Option<Box<dyn BufRead>>,
    line_number: usize,
}

impl LineReader {
    fn next_line(&mut self) -> Result<Option<String>, FileDataSourceError> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        if inner.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if self.line_number == 0 {
            if let Some(stripped) = line.strip_prefix(BYTE_ORDER_MARK) {
                line = stripped.to_string();
            }
        }
        self.line_number += 1;
        if line.ends_with('\n') {
            line.pop();
        }
        line.retain(|c| c != '\r');
        Ok(Some(line))
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

/// One parsed record and the physical line it starts on
type RawRecord = (usize, Vec<String>);

/// Row source over delimited text
pub struct CsvReader {
    name: String,
    config: CsvSourceConfig,
    lines: LineReader,
    parser: DelimitedRowParser,
    columns: Vec<String>,
    types: Vec<DataType>,
    converter: Arc<TypeConverter>,
    /// Records read ahead for headerless column counting or type inference
    pending: VecDeque<RawRecord>,
    rows_returned: usize,
    /// Comment lines are only recognised until the first record is read
    skip_comments: bool,
}

impl CsvReader {
    /// Open a file.
    pub fn open(path: impl AsRef<Path>, config: CsvSourceConfig) -> Result<Self, FileDataSourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FileDataSourceError::FileNotFound(path.display().to_string()),
            ErrorKind::PermissionDenied => {
                FileDataSourceError::PermissionDenied(path.display().to_string())
            }
            _ => FileDataSourceError::from(e),
        })?;
        Self::from_reader(path.display().to_string(), file, config)
    }

    /// Read from any character stream.
    pub fn from_reader<R: Read + 'static>(
        name: impl Into<String>,
        reader: R,
        config: CsvSourceConfig,
    ) -> Result<Self, FileDataSourceError> {
        config.validate()?;
        let parser = DelimitedRowParser::new(&config)?;
        let converter = Arc::new(config.converter()?);
        let mut csv = Self {
            name: name.into(),
            config,
            lines: LineReader {
                inner: Some(Box::new(BufReader::new(reader))),
                line_number: 0,
            },
            parser,
            columns: Vec::new(),
            types: Vec::new(),
            converter,
            pending: VecDeque::new(),
            rows_returned: 0,
            skip_comments: false,
        };
        csv.read_header()?;
        csv.resolve_types()?;
        Ok(csv)
    }

    /// Read an in-memory string.
    pub fn from_text(text: &str, config: CsvSourceConfig) -> Result<Self, FileDataSourceError> {
        Self::from_reader("<text>", std::io::Cursor::new(text.to_string()), config)
    }

    /// Physical line number of the last line read
    pub fn line_number(&self) -> usize {
        self.lines.line_number
    }

    fn read_header(&mut self) -> Result<(), FileDataSourceError> {
        for _ in 0..self.config.skip_leading_lines {
            if self.lines.next_line()?.is_none() {
                break;
            }
        }

        let file_header = if self.config.has_header {
            self.skip_comments = true;
            let record = self.read_record()?;
            record.map(|(_, fields)| fields)
        } else {
            None
        };

        let mut names = if let Some(header_line) = &self.config.header_line {
            self.parser.parse_line(header_line)?
        } else if let Some(names) = file_header {
            names
        } else {
            // no header: name columns after the width of the first record
            self.skip_comments = true;
            let width = match self.read_record()? {
                Some(record) => {
                    let width = record.1.len();
                    self.pending.push_back(record);
                    width
                }
                None => 0,
            };
            (1..=width).map(|i| format!("COLUMN{}", i)).collect()
        };
        self.skip_comments = false;

        if self.config.trim_headers {
            for name in &mut names {
                *name = name.trim().to_string();
            }
        }
        if self.config.defective_headers {
            for (i, name) in names.iter_mut().enumerate() {
                if name.is_empty() {
                    *name = format!("COLUMN{}", i + 1);
                    log::debug!("{}: repaired empty header name as {}", self.name, name);
                }
            }
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].iter().any(|n| n.eq_ignore_ascii_case(name)) {
                return Err(FileDataSourceError::HeaderError(format!(
                    "Duplicate column name '{}'",
                    name
                )));
            }
        }
        self.columns = names;

        for _ in 0..self.config.skip_leading_data_lines {
            if self.next_record()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn resolve_types(&mut self) -> Result<(), FileDataSourceError> {
        let width = self.columns.len();
        if let Some(declared) = self.config.declared_types()? {
            let last = declared.last().copied().unwrap_or(DataType::String);
            self.types = (0..width)
                .map(|i| declared.get(i).copied().unwrap_or(last))
                .collect();
            return Ok(());
        }

        while self.pending.len() < self.config.inference_rows {
            match self.read_record()? {
                Some(record) => self.pending.push_back(record),
                None => break,
            }
        }
        self.types = (0..width)
            .map(|i| {
                let samples: Vec<&str> = self
                    .pending
                    .iter()
                    .filter(|(_, fields)| fields.len() == width)
                    .map(|(_, fields)| fields[i].as_str())
                    .collect();
                self.converter.infer(&samples)
            })
            .collect();
        log::debug!(
            "{}: inferred column types {:?} from {} records",
            self.name,
            self.types,
            self.pending.len()
        );
        Ok(())
    }

    /// Next record, read ahead or from the input
    fn next_record(&mut self) -> Result<Option<RawRecord>, FileDataSourceError> {
        match self.pending.pop_front() {
            Some(record) => Ok(Some(record)),
            None => self.read_record(),
        }
    }

    /// Parse the next record from the input. Blank lines outside quotes are
    /// skipped; malformed records are skipped too when the configuration
    /// tolerates them.
    fn read_record(&mut self) -> Result<Option<RawRecord>, FileDataSourceError> {
        loop {
            let Some(line) = self.lines.next_line()? else {
                return Ok(None);
            };
            if line.is_empty() {
                continue;
            }
            if self.skip_comments {
                if let Some(marker) = self.config.comment_char {
                    if line.starts_with(marker) {
                        continue;
                    }
                }
            }
            let start = self.lines.line_number;
            let lines = &mut self.lines;
            match self.parser.parse_record(&line, start, &mut || lines.next_line()) {
                Ok(fields) => return Ok(Some((start, fields))),
                Err(e @ FileDataSourceError::CsvParseError { .. })
                    if self.config.ignore_unparseable_lines =>
                {
                    log::warn!("{}: skipping unparseable record: {}", self.name, e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Bring a record to the header's width, or explain why it cannot be.
    fn fit_to_header(&self, line: usize, mut fields: Vec<String>) -> Result<Vec<String>, FileDataSourceError> {
        let width = self.columns.len();
        if fields.len() == width {
            return Ok(fields);
        }
        if fields.len() < width {
            if let Some(missing) = &self.config.missing_value {
                fields.resize(width, missing.clone());
                return Ok(fields);
            }
        }
        Err(FileDataSourceError::CsvParseError {
            message: format!(
                "Record has {} fields but the header has {}",
                fields.len(),
                width
            ),
            line,
        })
    }

    fn read_row(&mut self) -> Result<Option<Vec<Option<FieldValue>>>, FileDataSourceError> {
        if self.config.max_data_lines > 0 && self.rows_returned >= self.config.max_data_lines {
            return Ok(None);
        }
        loop {
            let Some((line, fields)) = self.next_record()? else {
                return Ok(None);
            };
            let fields = match self.fit_to_header(line, fields) {
                Ok(fields) => fields,
                Err(e) if self.config.ignore_unparseable_lines => {
                    log::warn!("{}: skipping record: {}", self.name, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.rows_returned += 1;
            let row = fields
                .iter()
                .zip(&self.types)
                .map(|(raw, data_type)| self.converter.parse_typed(raw, *data_type))
                .collect();
            return Ok(Some(row));
        }
    }
}

impl RowSource for CsvReader {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn column_types(&self) -> Vec<DataType> {
        self.types.clone()
    }

    fn converter(&self) -> Arc<TypeConverter> {
        self.converter.clone()
    }

    fn next_row(&mut self) -> SqlResult<Option<Vec<Option<FieldValue>>>> {
        Ok(self.read_row()?)
    }

    fn close(&mut self) {
        self.lines.close();
        self.pending.clear();
    }
}

impl std::fmt::Debug for CsvReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvReader")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("types", &self.types)
            .field("line_number", &self.lines.line_number)
            .finish()
    }
}
