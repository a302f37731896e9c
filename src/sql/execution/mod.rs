//! Query execution core
//!
//! - [`engine`] prepares queries and hands out cursors
//! - [`processors`] plan and drive one execution
//! - [`expression`] evaluates values and three-valued conditions per row
//! - [`aggregation`] holds the aggregate accumulators
//! - [`cursor`] is the positioned view callers step through

pub mod aggregation;
pub mod convert;
pub mod cursor;
pub mod engine;
pub mod environment;
pub mod expression;
pub mod processors;
pub mod types;
pub mod utils;
pub mod validation;

pub use convert::TypeConverter;
pub use cursor::ResultCursor;
pub use engine::{ExecutionConfig, PreparedQuery, QueryEngine};
pub use environment::{EvalContext, RowEnvironment, StatementContext};
pub use processors::CancelHandle;
pub use types::{DataType, FieldValue, ResultColumn};
