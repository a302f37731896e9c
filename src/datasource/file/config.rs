//! Delimited file source configuration

use super::error::FileDataSourceError;
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::types::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Escaping convention inside quoted fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QuoteStyle {
    /// A doubled quote character is one literal quote
    #[default]
    Sql,
    /// Backslash escapes the following character
    C,
}

/// Inclusive, one-based character range of a fixed-width column
pub type FixedWidthRange = (usize, usize);

/// Configuration for reading one delimited text table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSourceConfig {
    /// Field separator
    pub separator: char,
    /// Quote character; `None` disables quoting
    pub quote_char: Option<char>,
    pub quote_style: QuoteStyle,
    /// First record holds column names
    pub has_header: bool,
    /// Header text used instead of the file's first record
    pub header_line: Option<String>,
    pub trim_headers: bool,
    pub trim_values: bool,
    /// Lines starting with this character are skipped before the header
    pub comment_char: Option<char>,
    /// Physical lines dropped before anything else is read
    pub skip_leading_lines: usize,
    /// Records dropped after the header
    pub skip_leading_data_lines: usize,
    /// Replace empty header names with COLUMN<n>
    pub defective_headers: bool,
    /// Skip malformed records instead of failing
    pub ignore_unparseable_lines: bool,
    /// Pads short records instead of treating them as malformed
    pub missing_value: Option<String>,
    /// Maximum number of data records read (0 = unlimited)
    pub max_data_lines: usize,
    /// Fixed-width column ranges, e.g. `"1-3,4-6"`
    pub fixed_widths: Option<String>,
    /// Comma separated type names; the last repeats for extra columns.
    /// Empty means infer from the data.
    pub column_types: String,
    /// Records sampled when inferring column types
    pub inference_rows: usize,
    pub date_format: Option<String>,
    pub time_format: Option<String>,
    pub timestamp_format: Option<String>,
}

impl Default for CsvSourceConfig {
    fn default() -> Self {
        Self {
            separator: ',',
            quote_char: Some('"'),
            quote_style: QuoteStyle::Sql,
            has_header: true,
            header_line: None,
            trim_headers: true,
            trim_values: false,
            comment_char: None,
            skip_leading_lines: 0,
            skip_leading_data_lines: 0,
            defective_headers: false,
            ignore_unparseable_lines: false,
            missing_value: None,
            max_data_lines: 0,
            fixed_widths: None,
            column_types: "String".to_string(),
            inference_rows: 100,
            date_format: None,
            time_format: None,
            timestamp_format: None,
        }
    }
}

impl CsvSourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_quote_style(mut self, style: QuoteStyle) -> Self {
        self.quote_style = style;
        self
    }

    pub fn with_column_types(mut self, types: impl Into<String>) -> Self {
        self.column_types = types.into();
        self
    }

    /// Infer column types from the first `inference_rows` records
    pub fn infer_types(mut self) -> Self {
        self.column_types.clear();
        self
    }

    pub fn with_fixed_widths(mut self, widths: impl Into<String>) -> Self {
        self.fixed_widths = Some(widths.into());
        self
    }

    pub fn without_header(mut self) -> Self {
        self.has_header = false;
        self
    }

    /// Build a configuration from driver-style properties.
    ///
    /// Unknown keys are ignored; recognised keys with malformed values are
    /// rejected.
    pub fn from_properties(
        properties: &HashMap<String, String>,
    ) -> Result<Self, FileDataSourceError> {
        let mut config = Self::default();

        for (key, value) in properties {
            match key.as_str() {
                "separator" => config.separator = parse_separator(value)?,
                "quotechar" => {
                    config.quote_char = if value.is_empty() {
                        None
                    } else {
                        Some(single_char(key, value)?)
                    }
                }
                "quoteStyle" => {
                    config.quote_style = match value.to_uppercase().as_str() {
                        "SQL" => QuoteStyle::Sql,
                        "C" => QuoteStyle::C,
                        _ => {
                            return Err(FileDataSourceError::InvalidConfig(format!(
                                "Unknown quoteStyle '{}'",
                                value
                            )))
                        }
                    }
                }
                "suppressHeaders" => config.has_header = !parse_bool(key, value)?,
                "headerline" => config.header_line = Some(value.clone()),
                "trimHeaders" => config.trim_headers = parse_bool(key, value)?,
                "trimValues" => config.trim_values = parse_bool(key, value)?,
                "commentChar" => {
                    config.comment_char = if value.is_empty() {
                        None
                    } else {
                        Some(single_char(key, value)?)
                    }
                }
                "skipLeadingLines" => config.skip_leading_lines = parse_count(key, value)?,
                "skipLeadingDataLines" => {
                    config.skip_leading_data_lines = parse_count(key, value)?
                }
                "defectiveHeaders" => config.defective_headers = parse_bool(key, value)?,
                "ignoreNonParseableLines" => {
                    config.ignore_unparseable_lines = parse_bool(key, value)?
                }
                "missingValue" => config.missing_value = Some(value.clone()),
                "maxDataLines" => config.max_data_lines = parse_count(key, value)?,
                "fixedWidths" => config.fixed_widths = Some(value.clone()),
                "columnTypes" => config.column_types = value.clone(),
                "inferenceRows" => config.inference_rows = parse_count(key, value)?,
                "dateFormat" => config.date_format = Some(value.clone()),
                "timeFormat" => config.time_format = Some(value.clone()),
                "timestampFormat" => config.timestamp_format = Some(value.clone()),
                other => log::debug!("Ignoring unknown file source property '{}'", other),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check option consistency and every derived setting.
    pub fn validate(&self) -> Result<(), FileDataSourceError> {
        if let Some(quote) = self.quote_char {
            if quote == self.separator {
                return Err(FileDataSourceError::InvalidConfig(
                    "Separator and quote character cannot be the same".to_string(),
                ));
            }
        }
        if self.separator == '\n' || self.separator == '\r' {
            return Err(FileDataSourceError::InvalidConfig(
                "Separator cannot be a line break".to_string(),
            ));
        }
        if self.inference_rows == 0 {
            return Err(FileDataSourceError::InvalidConfig(
                "inference_rows must be greater than 0".to_string(),
            ));
        }
        self.fixed_width_ranges()?;
        self.declared_types()?;
        self.converter()?;
        Ok(())
    }

    /// Parsed fixed-width ranges, if configured.
    pub fn fixed_width_ranges(&self) -> Result<Option<Vec<FixedWidthRange>>, FileDataSourceError> {
        let Some(widths) = &self.fixed_widths else {
            return Ok(None);
        };
        let invalid = |part: &str| {
            FileDataSourceError::InvalidConfig(format!(
                "Invalid fixed-width range '{}' in '{}'",
                part, widths
            ))
        };
        let mut ranges = Vec::new();
        for part in widths.split(',').map(str::trim) {
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (start.trim(), end.trim()),
                None => (part, part),
            };
            let start: usize = start.parse().map_err(|_| invalid(part))?;
            let end: usize = end.parse().map_err(|_| invalid(part))?;
            if start == 0 || end < start {
                return Err(invalid(part));
            }
            ranges.push((start, end));
        }
        Ok(Some(ranges))
    }

    /// Declared types, or `None` when types are inferred from the data.
    pub fn declared_types(&self) -> Result<Option<Vec<DataType>>, FileDataSourceError> {
        if self.column_types.trim().is_empty() {
            return Ok(None);
        }
        self.column_types
            .split(',')
            .map(|name| {
                DataType::from_name(name)
                    .map_err(|e| FileDataSourceError::InvalidConfig(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Type converter for the configured date/time formats
    pub fn converter(&self) -> Result<TypeConverter, FileDataSourceError> {
        TypeConverter::new(
            self.date_format.as_deref(),
            self.time_format.as_deref(),
            self.timestamp_format.as_deref(),
        )
        .map_err(|e| FileDataSourceError::InvalidConfig(e.to_string()))
    }
}

fn single_char(key: &str, value: &str) -> Result<char, FileDataSourceError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(FileDataSourceError::InvalidConfig(format!(
            "{} must be a single character, got '{}'",
            key, value
        ))),
    }
}

/// A single character, or `\t` for tab
fn parse_separator(value: &str) -> Result<char, FileDataSourceError> {
    if value == "\\t" {
        return Ok('\t');
    }
    single_char("separator", value)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, FileDataSourceError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(FileDataSourceError::InvalidConfig(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, FileDataSourceError> {
    value.trim().parse().map_err(|_| {
        FileDataSourceError::InvalidConfig(format!(
            "{} must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}
