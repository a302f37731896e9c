// SQL execution over delimited text tables
// Queries arrive as parsed descriptors; no SQL text parsing happens here
pub mod ast;
pub mod error;
pub mod execution;

// Re-export main API
pub use ast::{Condition, Expr, QueryDescriptor, SelectExpr, SelectItem};
pub use error::{SqlError, SqlResult};
pub use execution::{
    CancelHandle, DataType, ExecutionConfig, FieldValue, PreparedQuery, QueryEngine,
    ResultColumn, ResultCursor,
};

// Version and feature info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FEATURES: &[&str] = &[
    "select_where",
    "distinct",
    "group_by",         // order-preserving groups, HAVING
    "order_by",         // stable, nulls last
    "limit_offset",
    "aggregate_functions", // COUNT, SUM, AVG, MIN, MAX, STRING_AGG, ARRAY_AGG
    "string_functions", // UPPER, LOWER, TRIM, SUBSTRING, REPLACE, SOUNDEX
    "math_functions",   // ABS, ROUND, CEIL, FLOOR, TO_NUMBER
    "date_functions",   // YEAR, MONTH, DAYOFWEEK, CURRENT_TIMESTAMP
    "user_functions",   // typed signatures resolved at preparation
    "subqueries",       // scalar, EXISTS, IN; correlated
    "placeholders",
    "scrollable_cursors",
    "fixed_width_columns",
];
