//! Table catalog: table names to source factories.

use super::file::{CsvReader, CsvSourceConfig};
use super::memory::MemoryTable;
use super::traits::{RowSource, TableProvider};
use crate::sql::error::{SqlError, SqlResult};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Registered tables, looked up case-insensitively.
#[derive(Clone, Default)]
pub struct TableCatalog {
    tables: HashMap<String, Arc<dyn TableProvider>>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under `name`, replacing any earlier one.
    pub fn register(&mut self, name: &str, provider: impl TableProvider + 'static) {
        log::debug!("Registering table {}", name);
        self.tables.insert(name.to_uppercase(), Arc::new(provider));
    }

    /// Register a delimited file. The configuration is validated now; the
    /// file itself is opened on every execution.
    pub fn register_csv(
        &mut self,
        name: &str,
        path: impl Into<PathBuf>,
        config: CsvSourceConfig,
    ) -> SqlResult<()> {
        config.validate()?;
        let path = path.into();
        self.register(name, move || -> SqlResult<Box<dyn RowSource>> {
            Ok(Box::new(CsvReader::open(&path, config.clone())?))
        });
        Ok(())
    }

    /// Register delimited text held in memory.
    pub fn register_text(
        &mut self,
        name: &str,
        text: impl Into<String>,
        config: CsvSourceConfig,
    ) -> SqlResult<()> {
        config.validate()?;
        let text: Arc<str> = Arc::from(text.into());
        self.register(name, move || -> SqlResult<Box<dyn RowSource>> {
            Ok(Box::new(CsvReader::from_text(&text, config.clone())?))
        });
        Ok(())
    }

    pub fn register_memory(&mut self, name: &str, table: MemoryTable) {
        self.register(name, table);
    }

    /// Open a fresh source over a registered table.
    pub fn open(&self, name: &str) -> SqlResult<Box<dyn RowSource>> {
        let provider = self.tables.get(&name.to_uppercase()).ok_or_else(|| {
            SqlError::validation_error(format!("Unknown table '{}'", name), None)
        })?;
        provider.open()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_uppercase())
    }

    /// Registered table names, upper-cased and sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TableCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableCatalog")
            .field("tables", &self.table_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::execution::types::FieldValue;
    use std::io::Write;

    #[test]
    fn test_open_registered_tables() {
        let mut catalog = TableCatalog::new();
        catalog.register_memory(
            "numbers",
            MemoryTable::with_string_columns(&["n"])
                .unwrap()
                .with_rows(vec![vec![Some(FieldValue::String("1".into()))]])
                .unwrap(),
        );
        assert!(catalog.contains("NUMBERS"));
        let mut source = catalog.open("Numbers").unwrap();
        assert_eq!(source.columns(), &["n".to_string()]);
        assert!(source.next_row().unwrap().is_some());

        let err = catalog.open("missing").err().expect("expected error");
        assert!(matches!(err, SqlError::ValidationError { .. }));
    }

    #[test]
    fn test_csv_reopened_per_execution() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,2").unwrap();
        file.flush().unwrap();

        let mut catalog = TableCatalog::new();
        catalog
            .register_csv("t", file.path(), CsvSourceConfig::default())
            .unwrap();
        for _ in 0..2 {
            let mut source = catalog.open("t").unwrap();
            assert_eq!(source.next_row().unwrap().map(|r| r.len()), Some(2));
            assert!(source.next_row().unwrap().is_none());
        }
    }

    #[test]
    fn test_bad_configuration_rejected_at_registration() {
        let mut catalog = TableCatalog::new();
        let config = CsvSourceConfig::default().with_fixed_widths("x");
        assert!(matches!(
            catalog.register_csv("t", "t.csv", config),
            Err(SqlError::ConfigurationError { .. })
        ));
    }
}
