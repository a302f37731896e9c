//! Tests for the delimited file source and the table catalog

pub mod catalog_test;
pub mod csv_source_test;
