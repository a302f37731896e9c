//! File Data Source Error Types

use crate::sql::error::SqlError;
use std::fmt;

/// File data source specific errors
#[derive(Debug, Clone, PartialEq)]
pub enum FileDataSourceError {
    /// File not found or inaccessible
    FileNotFound(String),

    /// Permission denied accessing file or directory
    PermissionDenied(String),

    /// Malformed delimited text at the given one-based line
    CsvParseError { message: String, line: usize },

    /// Header problems (empty or duplicate column names)
    HeaderError(String),

    /// Invalid format option
    InvalidConfig(String),

    /// IO error
    IoError(String),
}

impl fmt::Display for FileDataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileDataSourceError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            FileDataSourceError::PermissionDenied(path) => {
                write!(f, "Permission denied accessing: {}", path)
            }
            FileDataSourceError::CsvParseError { message, line } => {
                write!(f, "CSV parsing error at line {}: {}", line, message)
            }
            FileDataSourceError::HeaderError(msg) => {
                write!(f, "Invalid header: {}", msg)
            }
            FileDataSourceError::InvalidConfig(msg) => {
                write!(f, "Invalid file source configuration: {}", msg)
            }
            FileDataSourceError::IoError(msg) => {
                write!(f, "IO error: {}", msg)
            }
        }
    }
}

impl std::error::Error for FileDataSourceError {}

impl From<std::io::Error> for FileDataSourceError {
    fn from(err: std::io::Error) -> Self {
        FileDataSourceError::IoError(err.to_string())
    }
}

impl From<FileDataSourceError> for SqlError {
    fn from(err: FileDataSourceError) -> Self {
        match err {
            FileDataSourceError::CsvParseError { message, line } => {
                SqlError::data_error(message, Some(line))
            }
            FileDataSourceError::InvalidConfig(message)
            | FileDataSourceError::HeaderError(message) => SqlError::configuration_error(message),
            other => SqlError::execution_error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_line_numbers() {
        let err: SqlError = FileDataSourceError::CsvParseError {
            message: "Unterminated quoted field".into(),
            line: 4,
        }
        .into();
        assert_eq!(err, SqlError::data_error("Unterminated quoted field", Some(4)));

        let err: SqlError = FileDataSourceError::HeaderError("Duplicate column 'A'".into()).into();
        assert!(matches!(err, SqlError::ConfigurationError { .. }));
    }
}
