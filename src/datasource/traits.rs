//! Row source traits
//!
//! The query engine never touches files directly. It pulls typed rows from a
//! [`RowSource`], which a [`TableProvider`] opens fresh for each execution.

use crate::sql::error::SqlResult;
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::types::{DataType, FieldValue};
use std::sync::Arc;

/// A forward-only stream of rows for one table.
///
/// Values are already typed; a row shorter than [`columns`](Self::columns) is
/// padded with NULL by the engine.
pub trait RowSource {
    /// Physical column names in table order
    fn columns(&self) -> &[String];

    /// Declared or inferred type of each column
    fn column_types(&self) -> Vec<DataType> {
        vec![DataType::String; self.columns().len()]
    }

    /// False when the column list is not known until rows are read. Queries
    /// over such sources skip static column validation.
    fn has_static_columns(&self) -> bool {
        true
    }

    /// Converter for the table's date/time formats
    fn converter(&self) -> Arc<TypeConverter> {
        Arc::new(TypeConverter::default())
    }

    /// Next row, or `None` at end of input
    fn next_row(&mut self) -> SqlResult<Option<Vec<Option<FieldValue>>>>;

    /// Release the underlying input. Further reads return `None`.
    fn close(&mut self) {}
}

/// Opens a new [`RowSource`] over a table.
pub trait TableProvider: Send + Sync {
    fn open(&self) -> SqlResult<Box<dyn RowSource>>;
}

impl<F> TableProvider for F
where
    F: Fn() -> SqlResult<Box<dyn RowSource>> + Send + Sync,
{
    fn open(&self) -> SqlResult<Box<dyn RowSource>> {
        self()
    }
}
