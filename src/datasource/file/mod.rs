//! Delimited text file sources
//!
//! - [`CsvSourceConfig`]: format options, also buildable from driver-style properties
//! - [`DelimitedRowParser`]: record splitting (quoted fields, fixed widths)
//! - [`CsvReader`]: physical line handling, headers and column typing

pub mod config;
pub mod error;
pub mod parser;
pub mod reader;

pub use config::{CsvSourceConfig, FixedWidthRange, QuoteStyle};
pub use error::FileDataSourceError;
pub use parser::{split_fixed_width, DelimitedRowParser};
pub use reader::CsvReader;
