pub mod aggregation_test;
pub mod cursor_test;
pub mod function_test;
pub mod query_test;
pub mod subquery_test;
