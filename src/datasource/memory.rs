//! In-memory tables.
//!
//! A [`MemoryTable`] already knows its column names and types, so the
//! declare-or-infer step of file sources is skipped entirely. Rows are shared
//! between the table and every source opened over it.

use super::traits::{RowSource, TableProvider};
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::types::{DataType, FieldValue};
use std::sync::Arc;

type Row = Vec<Option<FieldValue>>;

/// A table held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    columns: Vec<String>,
    types: Vec<DataType>,
    rows: Arc<Vec<Row>>,
    static_columns: bool,
    converter: Arc<TypeConverter>,
}

impl MemoryTable {
    /// Create an empty table. Column names must be unique (case-insensitive)
    /// and there must be one type per column.
    pub fn new(columns: Vec<String>, types: Vec<DataType>) -> SqlResult<Self> {
        if columns.len() != types.len() {
            return Err(SqlError::configuration_error(format!(
                "{} columns declared with {} types",
                columns.len(),
                types.len()
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(SqlError::configuration_error(format!(
                    "Duplicate column name '{}'",
                    column
                )));
            }
        }
        Ok(Self {
            columns,
            types,
            rows: Arc::new(Vec::new()),
            static_columns: true,
            converter: Arc::new(TypeConverter::default()),
        })
    }

    /// Table whose columns are all text
    pub fn with_string_columns(columns: &[&str]) -> SqlResult<Self> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            vec![DataType::String; columns.len()],
        )
    }

    pub fn with_converter(mut self, converter: TypeConverter) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    /// Report columns as not statically known
    pub fn with_dynamic_columns(mut self) -> Self {
        self.static_columns = false;
        self
    }

    /// Append a row. Rows longer than the column list are rejected.
    pub fn push_row(&mut self, row: Row) -> SqlResult<()> {
        if row.len() > self.columns.len() {
            return Err(SqlError::data_error(
                format!(
                    "Row has {} values but the table has {} columns",
                    row.len(),
                    self.columns.len()
                ),
                Some(self.rows.len() + 1),
            ));
        }
        Arc::make_mut(&mut self.rows).push(row);
        Ok(())
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Row>) -> SqlResult<Self> {
        for row in rows {
            self.push_row(row)?;
        }
        Ok(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Open a source positioned before the first row
    pub fn source(&self) -> MemorySource {
        MemorySource {
            table: self.clone(),
            position: 0,
            closed: false,
        }
    }
}

impl TableProvider for MemoryTable {
    fn open(&self) -> SqlResult<Box<dyn RowSource>> {
        Ok(Box::new(self.source()))
    }
}

/// Row source over a [`MemoryTable`].
#[derive(Debug)]
pub struct MemorySource {
    table: MemoryTable,
    position: usize,
    closed: bool,
}

impl RowSource for MemorySource {
    fn columns(&self) -> &[String] {
        &self.table.columns
    }

    fn column_types(&self) -> Vec<DataType> {
        self.table.types.clone()
    }

    fn has_static_columns(&self) -> bool {
        self.table.static_columns
    }

    fn converter(&self) -> Arc<TypeConverter> {
        self.table.converter.clone()
    }

    fn next_row(&mut self) -> SqlResult<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        let row = self.table.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
