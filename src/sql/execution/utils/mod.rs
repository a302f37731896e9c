//! Pure value utilities with no engine state.

pub mod field_value_arithmetic;
pub mod field_value_comparator;

pub use field_value_arithmetic::FieldValueArithmetic;
pub use field_value_comparator::FieldValueComparator;
