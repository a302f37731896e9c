pub mod common;
// Delimited file and catalog tests
pub mod datasource;
// Query planning and execution tests
pub mod sql;
