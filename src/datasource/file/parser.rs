//! Delimited record parsing.
//!
//! One logical record may span several physical lines when a quoted field
//! contains line breaks. The parser works one physical line at a time and
//! asks its caller for the next line whenever a quote is still open at the
//! end of the current one.

use super::config::{CsvSourceConfig, FixedWidthRange, QuoteStyle};
use super::error::FileDataSourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Outside quotes
    Unquoted,
    /// Inside an open quoted field
    InQuotedField,
    /// Just read a quote inside a quoted field: either the closing quote or
    /// the first half of a doubled quote
    AfterQuoteInQuotedField,
}

/// Splits records into field strings.
#[derive(Debug, Clone)]
pub struct DelimitedRowParser {
    separator: char,
    quote_char: Option<char>,
    quote_style: QuoteStyle,
    trim_values: bool,
    fixed_widths: Option<Vec<FixedWidthRange>>,
}

impl DelimitedRowParser {
    pub fn new(config: &CsvSourceConfig) -> Result<Self, FileDataSourceError> {
        Ok(Self {
            separator: config.separator,
            quote_char: config.quote_char,
            quote_style: config.quote_style,
            trim_values: config.trim_values,
            fixed_widths: config.fixed_width_ranges()?,
        })
    }

    pub fn is_fixed_width(&self) -> bool {
        self.fixed_widths.is_some()
    }

    /// Parse a record that must fit on one line.
    pub fn parse_line(&self, line: &str) -> Result<Vec<String>, FileDataSourceError> {
        self.parse_record(line, 1, &mut || Ok(None))
    }

    /// Parse the record starting with `first_line`, found at one-based
    /// physical line `start_line`. `next_line` supplies continuation lines
    /// while a quoted field is open.
    pub fn parse_record(
        &self,
        first_line: &str,
        start_line: usize,
        next_line: &mut dyn FnMut() -> Result<Option<String>, FileDataSourceError>,
    ) -> Result<Vec<String>, FileDataSourceError> {
        if let Some(ranges) = &self.fixed_widths {
            return Ok(split_fixed_width(first_line, ranges));
        }

        let mut fields = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut state = ParseState::Unquoted;
        let mut line = first_line.to_string();

        loop {
            let mut chars = line.chars();
            while let Some(c) = chars.next() {
                match state {
                    ParseState::Unquoted => {
                        if c == self.separator {
                            fields.push(self.finish_field(&mut current, quoted));
                            quoted = false;
                        } else if Some(c) == self.quote_char && self.at_field_start(&current, quoted) {
                            current.clear();
                            quoted = true;
                            state = ParseState::InQuotedField;
                        } else {
                            current.push(c);
                        }
                    }
                    ParseState::InQuotedField => {
                        if self.quote_style == QuoteStyle::C && c == '\\' {
                            // a trailing backslash escapes the line break, which
                            // the continuation below appends
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        } else if Some(c) == self.quote_char {
                            state = ParseState::AfterQuoteInQuotedField;
                        } else {
                            current.push(c);
                        }
                    }
                    ParseState::AfterQuoteInQuotedField => {
                        if Some(c) == self.quote_char && self.quote_style == QuoteStyle::Sql {
                            current.push(c);
                            state = ParseState::InQuotedField;
                        } else if c == self.separator {
                            fields.push(self.finish_field(&mut current, quoted));
                            quoted = false;
                            state = ParseState::Unquoted;
                        } else if !(self.trim_values && c.is_whitespace()) {
                            // stray text after the closing quote is kept
                            current.push(c);
                            state = ParseState::Unquoted;
                        }
                    }
                }
            }

            if state != ParseState::InQuotedField {
                break;
            }
            match next_line()? {
                Some(next) => {
                    current.push('\n');
                    line = next;
                }
                None => {
                    return Err(FileDataSourceError::CsvParseError {
                        message: "Unterminated quoted field".to_string(),
                        line: start_line,
                    })
                }
            }
        }

        fields.push(self.finish_field(&mut current, quoted));
        Ok(fields)
    }

    /// A quote opens a field only before any other character, or after
    /// leading blanks when values are trimmed.
    fn at_field_start(&self, current: &str, quoted: bool) -> bool {
        !quoted && (current.is_empty() || (self.trim_values && current.trim().is_empty()))
    }

    fn finish_field(&self, current: &mut String, quoted: bool) -> String {
        let value = std::mem::take(current);
        if self.trim_values && !quoted {
            value.trim().to_string()
        } else {
            value
        }
    }
}

/// Cut a line into fixed-width columns. Columns past the end of a short line
/// are empty.
pub fn split_fixed_width(line: &str, ranges: &[FixedWidthRange]) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    ranges
        .iter()
        .map(|&(start, end)| {
            let from = start - 1;
            if from >= chars.len() {
                return String::new();
            }
            let to = end.min(chars.len());
            chars[from..to].iter().collect::<String>().trim().to_string()
        })
        .collect()
}
