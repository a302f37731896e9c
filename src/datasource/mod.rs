//! Table data sources
//!
//! The query engine reads tables through the [`RowSource`] trait. Sources are
//! opened by a [`TableProvider`] each time a query executes; a
//! [`TableCatalog`] maps table names to providers.
//!
//! ## Examples
//!
//! ```rust
//! use flatsql::datasource::{CsvSourceConfig, RowSource, TableCatalog};
//!
//! let mut catalog = TableCatalog::new();
//! catalog
//!     .register_text("people", "name,age\nann,31\n", CsvSourceConfig::default().infer_types())
//!     .unwrap();
//!
//! let mut source = catalog.open("people").unwrap();
//! assert_eq!(source.columns(), &["name".to_string(), "age".to_string()]);
//! assert!(source.next_row().unwrap().is_some());
//! ```

pub mod catalog;
pub mod file;
pub mod memory;
pub mod traits;

pub use catalog::TableCatalog;
pub use file::{CsvReader, CsvSourceConfig, FileDataSourceError, QuoteStyle};
pub use memory::{MemorySource, MemoryTable};
pub use traits::{RowSource, TableProvider};
