/*!
# Cursor Tests

State machine rules, column metadata, cancellation and timeouts.
*/

use crate::unit::common::{catalog, engine};
use flatsql::sql::ast::{Expr, OrderByExpr, QueryDescriptor, SelectItem};
use flatsql::sql::{CancelHandle, DataType, ExecutionConfig, FieldValue, QueryEngine, SqlError};
use std::time::Duration;

fn ids() -> QueryDescriptor {
    QueryDescriptor::new(vec![SelectItem::column("id"), SelectItem::column("name")])
        .from_table("employees")
}

fn is_usage_error<T: std::fmt::Debug>(result: Result<T, SqlError>) -> bool {
    matches!(result, Err(SqlError::UsageError { .. }))
}

#[test]
fn test_reading_outside_a_row_is_a_usage_error() {
    let mut cursor = engine().execute(&ids()).unwrap();
    assert!(cursor.is_before_first());
    assert!(is_usage_error(cursor.get(0)));

    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get(0).unwrap(), Some(FieldValue::Integer(1)));
    assert_eq!(cursor.get_by_name("NAME").unwrap(), Some(FieldValue::String("Ann".into())));
    assert!(is_usage_error(cursor.get(7)));

    while cursor.next().unwrap() {}
    assert!(cursor.is_after_last());
    assert!(is_usage_error(cursor.get(0)));
    assert!(!cursor.next().unwrap());

    cursor.close();
    cursor.close();
    assert!(cursor.is_closed());
    assert!(is_usage_error(cursor.next()));
    assert!(is_usage_error(cursor.get(0)));
}

#[test]
fn test_forward_only_rejects_scrolling() {
    let mut cursor = engine().execute(&ids()).unwrap();
    assert!(!cursor.is_scrollable());
    assert!(is_usage_error(cursor.previous()));
    assert!(is_usage_error(cursor.first()));
    assert!(is_usage_error(cursor.last()));
    assert!(is_usage_error(cursor.absolute(2)));
    assert!(is_usage_error(cursor.relative(1)));
    // still usable afterwards
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.row_number(), 1);
}

#[test]
fn test_scrollable_positions() {
    let e = QueryEngine::new(catalog()).with_config(ExecutionConfig::default().scrollable());
    let query = ids().order_by(vec![OrderByExpr::asc(Expr::column("name"))]);
    let mut cursor = e.execute(&query).unwrap();

    assert!(cursor.absolute(2).unwrap());
    assert_eq!(cursor.get(1).unwrap(), Some(FieldValue::String("Bob".into())));
    assert!(cursor.relative(-1).unwrap());
    assert_eq!(cursor.row_number(), 1);
    assert!(!cursor.previous().unwrap());
    assert!(cursor.is_before_first());
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.row_number(), 1);
    assert!(cursor.last().unwrap());
    assert_eq!(cursor.row_number(), 5);
    assert!(!cursor.next().unwrap());
    assert!(cursor.absolute(-2).unwrap());
    assert_eq!(cursor.get(1).unwrap(), Some(FieldValue::String("Dee".into())));
    assert!(!cursor.absolute(9).unwrap());
    assert!(cursor.is_after_last());
}

#[test]
fn test_extreme_relative_moves_clamp_to_the_ends() {
    let e = QueryEngine::new(catalog()).with_config(ExecutionConfig::default().scrollable());
    let mut cursor = e.execute(&ids()).unwrap();

    assert!(cursor.next().unwrap());
    assert!(!cursor.relative(i64::MAX).unwrap());
    assert!(cursor.is_after_last());

    assert!(!cursor.relative(i64::MIN).unwrap());
    assert!(cursor.is_before_first());

    assert!(!cursor.absolute(i64::MIN).unwrap());
    assert!(cursor.is_before_first());
    assert!(!cursor.absolute(i64::MAX).unwrap());
    assert!(cursor.is_after_last());

    assert!(cursor.relative(-1).unwrap());
    assert_eq!(cursor.row_number(), 5);
}

#[test]
fn test_column_metadata() {
    let query = QueryDescriptor::new(vec![
        SelectItem::Wildcard,
        SelectItem::aliased(
            Expr::function("upper", vec![Expr::column("name")]),
            "shout",
        ),
    ])
    .from_table("employees");
    let prepared = engine().prepare(&query).unwrap();
    let described: Vec<(String, DataType, String)> = prepared
        .columns()
        .iter()
        .map(|c| (c.label.clone(), c.data_type, c.type_name.clone()))
        .collect();
    assert_eq!(
        described,
        vec![
            ("id".into(), DataType::Integer, "INTEGER".into()),
            ("name".into(), DataType::String, "VARCHAR".into()),
            ("dept".into(), DataType::String, "VARCHAR".into()),
            ("salary".into(), DataType::Integer, "INTEGER".into()),
            ("hired".into(), DataType::Date, "DATE".into()),
            ("shout".into(), DataType::String, "VARCHAR".into()),
        ]
    );
    assert_eq!(prepared.columns()[4].display_size, 10);
}

#[test]
fn test_cancellation_fails_the_next_operation() {
    let mut cursor = engine().execute(&ids()).unwrap();
    assert!(cursor.next().unwrap());
    let handle = cursor.cancel_handle();
    handle.cancel();
    assert_eq!(cursor.next(), Err(SqlError::Cancelled));
    assert_eq!(cursor.get(0), Err(SqlError::Cancelled));

    let cancelled = CancelHandle::new();
    cancelled.cancel();
    let mut prepared = engine().prepare(&ids()).unwrap();
    assert_eq!(prepared.execute_with_cancel(cancelled).err(), Some(SqlError::Cancelled));
}

#[test]
fn test_expired_timeout() {
    let e = QueryEngine::new(catalog())
        .with_config(ExecutionConfig::default().with_timeout(Duration::ZERO));
    assert!(matches!(e.execute(&ids()), Err(SqlError::Timeout { .. })));
}

#[test]
fn test_cancel_from_another_thread() {
    let query = ids().order_by(vec![OrderByExpr::desc(Expr::column("id"))]);
    let mut cursor = engine().execute(&query).unwrap();
    let handle = cursor.cancel_handle();
    std::thread::spawn(move || handle.cancel()).join().unwrap();
    assert_eq!(cursor.next(), Err(SqlError::Cancelled));
}
