//! Static Query Validation
//!
//! Runs when a query is prepared, before any row is read:
//!
//! - **Field validation**: referenced columns exist in the source table and
//!   called functions exist with a matching argument count
//! - **Aggregation validation**: aggregates appear only where they may, are
//!   not nested, and do not mix with ungrouped columns

pub mod aggregation_validator;
pub mod field_validator;

pub use aggregation_validator::AggregationValidator;
pub use field_validator::FieldValidator;
