/*!
# SQL Error Handling

Every operation of the query core returns a [`SqlError`] on failure. The
variants follow the life cycle of a query:

- **Configuration errors**: malformed format options, unknown declared type
  names, invalid fixed-width ranges. Raised while a table or query is set up.
- **Validation errors**: unknown columns, illegal aggregate/grouping mixes,
  out-of-range ordinals. Raised when a query is prepared, before any row is read.
- **Data errors**: malformed quoting, rows whose field count disagrees with
  the header. Raised when the offending row is reached.
- **Execution errors**: division by zero on exact types, scalar sub-queries
  returning more than one row. Raised while an expression is evaluated.
- **Usage errors**: cursor operations that violate the cursor state machine.
- **Cancelled / Timeout**: cooperative interruption of a running query.

## Examples

```rust
use flatsql::sql::error::SqlError;

let error = SqlError::validation_error("Unknown column", Some("PRICE".to_string()));
assert_eq!(error.to_string(), "Validation error for column 'PRICE': Unknown column");

let error = SqlError::data_error("Unterminated quoted field", Some(12));
assert_eq!(error.to_string(), "Data error at line 12: Unterminated quoted field");
```
*/

use std::fmt;

/// Error type for query preparation and execution.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlError {
    /// Invalid table or query configuration.
    ConfigurationError {
        /// Description of the bad setting
        message: String,
    },

    /// Query failed static validation against the table's columns.
    ValidationError {
        /// Description of the validation failure
        message: String,
        /// Column that caused the failure, if applicable
        column: Option<String>,
    },

    /// Input data could not be turned into a row.
    DataError {
        /// Description of the data problem
        message: String,
        /// One-based physical line number where the problem starts
        line: Option<usize>,
    },

    /// Runtime failure while evaluating an expression.
    ExecutionError {
        /// Description of the failure
        message: String,
    },

    /// An operand or argument had an unusable type.
    TypeError {
        /// Expected data type
        expected: String,
        /// Actual data type encountered
        actual: String,
        /// Offending value, if available
        value: Option<String>,
    },

    /// A cursor or statement was used out of order.
    UsageError {
        /// Description of the misuse
        message: String,
    },

    /// The query was cancelled by the caller.
    Cancelled,

    /// The query ran past its deadline.
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u128,
    },
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            SqlError::ValidationError { message, column } => {
                if let Some(col) = column {
                    write!(f, "Validation error for column '{}': {}", col, message)
                } else {
                    write!(f, "Validation error: {}", message)
                }
            }
            SqlError::DataError { message, line } => {
                if let Some(line) = line {
                    write!(f, "Data error at line {}: {}", line, message)
                } else {
                    write!(f, "Data error: {}", message)
                }
            }
            SqlError::ExecutionError { message } => {
                write!(f, "Query execution error: {}", message)
            }
            SqlError::TypeError {
                expected,
                actual,
                value,
            } => {
                if let Some(val) = value {
                    write!(
                        f,
                        "Type error: expected {}, got {} for value '{}'",
                        expected, actual, val
                    )
                } else {
                    write!(f, "Type error: expected {}, got {}", expected, actual)
                }
            }
            SqlError::UsageError { message } => write!(f, "Usage error: {}", message),
            SqlError::Cancelled => write!(f, "Query was cancelled"),
            SqlError::Timeout { timeout_ms } => {
                write!(f, "Query exceeded its timeout of {} ms", timeout_ms)
            }
        }
    }
}

impl std::error::Error for SqlError {}

impl SqlError {
    /// Create a configuration error
    pub fn configuration_error(message: impl Into<String>) -> Self {
        SqlError::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation_error(message: impl Into<String>, column: Option<String>) -> Self {
        SqlError::ValidationError {
            message: message.into(),
            column,
        }
    }

    /// Create a data error
    pub fn data_error(message: impl Into<String>, line: Option<usize>) -> Self {
        SqlError::DataError {
            message: message.into(),
            line,
        }
    }

    /// Create an execution error
    pub fn execution_error(message: impl Into<String>) -> Self {
        SqlError::ExecutionError {
            message: message.into(),
        }
    }

    /// Create a type error
    pub fn type_error(
        expected: impl Into<String>,
        actual: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        SqlError::TypeError {
            expected: expected.into(),
            actual: actual.into(),
            value,
        }
    }

    /// Create a usage error
    pub fn usage_error(message: impl Into<String>) -> Self {
        SqlError::UsageError {
            message: message.into(),
        }
    }

    /// Error for a reference to a column the table does not have
    pub fn unknown_column(name: &str) -> Self {
        SqlError::validation_error("Unknown column", Some(name.to_string()))
    }

    /// Error for a call to a function nobody registered
    pub fn unknown_function(name: &str) -> Self {
        SqlError::validation_error(format!("Unknown function '{}'", name), None)
    }

    /// True for errors that a tolerant reader may skip over row by row
    pub fn is_data_error(&self) -> bool {
        matches!(self, SqlError::DataError { .. })
    }
}

/// Result type for SQL operations
pub type SqlResult<T> = Result<T, SqlError>;
