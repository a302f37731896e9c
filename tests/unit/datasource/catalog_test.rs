//! Catalog registration and per-execution reopening of tables

use flatsql::datasource::{CsvSourceConfig, MemoryTable, TableCatalog};
use flatsql::sql::ast::{Expr, QueryDescriptor, SelectItem};
use flatsql::sql::{DataType, FieldValue, QueryEngine, SqlError};
use std::fs;
use std::io::Write;

fn count_query(table: &str) -> QueryDescriptor {
    QueryDescriptor::new(vec![SelectItem::expr(Expr::count_star())]).from_table(table)
}

fn count(engine: &QueryEngine, table: &str) -> Option<FieldValue> {
    let mut rows = engine.execute(&count_query(table)).unwrap().fetch_all().unwrap();
    rows.remove(0).remove(0)
}

#[test]
fn test_file_table_sees_changes_between_executions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.csv");
    fs::write(&path, "id,amount\n1,10\n2,20\n").unwrap();

    let mut catalog = TableCatalog::new();
    catalog
        .register_csv("orders", &path, CsvSourceConfig::default())
        .unwrap();
    let engine = QueryEngine::new(catalog);
    assert_eq!(count(&engine, "ORDERS"), Some(FieldValue::Long(2)));

    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "3,30").unwrap();
    drop(file);
    assert_eq!(count(&engine, "orders"), Some(FieldValue::Long(3)));
}

#[test]
fn test_prepared_query_replans_when_columns_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.csv");
    fs::write(&path, "a\n1\n").unwrap();

    let mut catalog = TableCatalog::new();
    catalog
        .register_csv("wide", &path, CsvSourceConfig::default())
        .unwrap();
    let engine = QueryEngine::new(catalog);
    let mut prepared = engine
        .prepare(&QueryDescriptor::new(vec![SelectItem::Wildcard]).from_table("wide"))
        .unwrap();
    assert_eq!(prepared.execute().unwrap().column_names(), vec!["a"]);

    fs::write(&path, "a,b\n1,2\n").unwrap();
    assert_eq!(prepared.execute().unwrap().column_names(), vec!["a", "b"]);
}

#[test]
fn test_missing_file_and_unknown_table() {
    let mut catalog = TableCatalog::new();
    catalog
        .register_csv("ghost", "/no/such/dir/ghost.csv", CsvSourceConfig::default())
        .unwrap();
    let engine = QueryEngine::new(catalog);

    assert!(matches!(
        engine.prepare(&count_query("ghost")),
        Err(SqlError::ExecutionError { .. })
    ));
    assert!(matches!(
        engine.prepare(&count_query("nowhere")),
        Err(SqlError::ValidationError { .. })
    ));
}

#[test]
fn test_memory_table_keeps_declared_types() {
    let table = MemoryTable::new(
        vec!["k".into(), "v".into()],
        vec![DataType::String, DataType::Double],
    )
    .unwrap()
    .with_rows(vec![
        vec![Some(FieldValue::String("x".into())), Some(FieldValue::Double(1.5))],
        vec![Some(FieldValue::String("y".into())), None],
    ])
    .unwrap();

    let mut catalog = TableCatalog::new();
    catalog.register_memory("kv", table);
    assert_eq!(catalog.table_names(), vec!["KV"]);

    let engine = QueryEngine::new(catalog);
    let prepared = engine
        .prepare(&QueryDescriptor::new(vec![SelectItem::column("v")]).from_table("kv"))
        .unwrap();
    assert_eq!(prepared.columns()[0].data_type, DataType::Double);
    assert_eq!(count(&engine, "kv"), Some(FieldValue::Long(2)));
}
