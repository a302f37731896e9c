/*!
# SELECT Pipeline Tests

Filtering, DISTINCT, grouping, ordering and windowing over the `employees`
fixture table.
*/

use crate::unit::common::{column_text, engine, query_text};
use flatsql::sql::ast::{
    AggregateFunction, ArithmeticOperator, ComparisonOperator, Condition, Expr, OrderByExpr,
    QueryDescriptor, SelectItem,
};
use flatsql::datasource::{MemoryTable, TableCatalog};
use flatsql::sql::{DataType, FieldValue, QueryEngine, SqlError};

fn names() -> QueryDescriptor {
    QueryDescriptor::new(vec![SelectItem::column("name")]).from_table("employees")
}

#[test]
fn test_where_keeps_only_true_rows() {
    let e = engine();
    let high = names().with_where(Condition::compare(
        Expr::column("salary"),
        ComparisonOperator::GreaterThan,
        Expr::int(90),
    ));
    assert_eq!(column_text(&e, &high), vec!["Ann", "Cid", "Dee"]);

    // Eve's NULL salary is unknown both ways
    let not_high = names().with_where(Condition::not(Condition::compare(
        Expr::column("salary"),
        ComparisonOperator::GreaterThan,
        Expr::int(90),
    )));
    assert_eq!(column_text(&e, &not_high), vec!["Bob"]);

    let missing = names().with_where(Condition::is_null(Expr::column("salary")));
    assert_eq!(column_text(&e, &missing), vec!["Eve"]);
}

#[test]
fn test_in_list_with_null_is_never_false() {
    let e = engine();
    let list = vec![Expr::int(1), Expr::int(3), Expr::null()];
    let inside = names().with_where(Condition::in_list(Expr::column("id"), list.clone()));
    assert_eq!(column_text(&e, &inside), vec!["Ann", "Cid"]);

    let outside = names().with_where(Condition::not(Condition::in_list(Expr::column("id"), list)));
    assert!(column_text(&e, &outside).is_empty());
}

#[test]
fn test_between_and_date_comparison() {
    let e = engine();
    let range = names().with_where(Condition::between(
        Expr::column("salary"),
        Expr::int(90),
        Expr::int(110),
    ));
    assert_eq!(column_text(&e, &range), vec!["Cid", "Dee"]);

    let recent = names().with_where(Condition::compare(
        Expr::column("hired"),
        ComparisonOperator::GreaterThanOrEqual,
        Expr::string("2020-01-01"),
    ));
    assert_eq!(column_text(&e, &recent), vec!["Bob", "Dee", "Eve"]);
}

#[test]
fn test_like_patterns() {
    let e = engine();
    let starts = names().with_where(Condition::like(Expr::column("name"), "A%"));
    assert_eq!(column_text(&e, &starts), vec!["Ann"]);

    let second_e = names().with_where(Condition::like(Expr::column("name"), "_e%"));
    assert_eq!(column_text(&e, &second_e), vec!["Dee"]);
}

#[test]
fn test_distinct_keeps_first_seen_order() {
    let query = QueryDescriptor::new(vec![SelectItem::column("dept")])
        .distinct()
        .from_table("employees");
    assert_eq!(column_text(&engine(), &query), vec!["eng", "ops", ""]);
}

#[test]
fn test_group_by_without_aggregates_is_distinct() {
    let e = engine();
    let grouped = QueryDescriptor::new(vec![SelectItem::column("dept")])
        .from_table("employees")
        .group_by(vec![Expr::column("dept")]);
    let distinct = QueryDescriptor::new(vec![SelectItem::column("dept")])
        .distinct()
        .from_table("employees");
    assert_eq!(query_text(&e, &grouped).unwrap(), query_text(&e, &distinct).unwrap());
}

#[test]
fn test_distinct_and_grouping_treat_signed_zeros_as_one_value() {
    let table = MemoryTable::new(vec!["v".into()], vec![DataType::Double])
        .unwrap()
        .with_rows(vec![
            vec![Some(FieldValue::Double(0.0))],
            vec![Some(FieldValue::Double(-0.0))],
            vec![Some(FieldValue::Double(1.5))],
        ])
        .unwrap();
    let mut catalog = TableCatalog::new();
    catalog.register_memory("zeros", table);
    let e = QueryEngine::new(catalog);

    let distinct = QueryDescriptor::new(vec![SelectItem::column("v")])
        .distinct()
        .from_table("zeros");
    assert_eq!(e.execute(&distinct).unwrap().fetch_all().unwrap().len(), 2);

    let grouped = QueryDescriptor::new(vec![
        SelectItem::column("v"),
        SelectItem::expr(Expr::count_star()),
    ])
    .from_table("zeros")
    .group_by(vec![Expr::column("v")]);
    let rows = e.execute(&grouped).unwrap().fetch_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], Some(FieldValue::Long(2)));
}

#[test]
fn test_order_by_is_stable_with_nulls_last() {
    let e = engine();
    let by_salary = names().order_by(vec![OrderByExpr::asc(Expr::column("salary"))]);
    assert_eq!(column_text(&e, &by_salary), vec!["Bob", "Dee", "Cid", "Ann", "Eve"]);

    let by_salary_desc = names().order_by(vec![OrderByExpr::desc(Expr::column("salary"))]);
    assert_eq!(column_text(&e, &by_salary_desc), vec!["Ann", "Cid", "Dee", "Bob", "Eve"]);

    // ties keep input order
    let by_dept = names().order_by(vec![OrderByExpr::asc(Expr::column("dept"))]);
    assert_eq!(column_text(&e, &by_dept), vec!["Dee", "Ann", "Cid", "Bob", "Eve"]);
}

#[test]
fn test_offset_and_limit_after_sort() {
    let query = names()
        .order_by(vec![OrderByExpr::asc(Expr::column("id"))])
        .offset(1)
        .limit(2);
    assert_eq!(column_text(&engine(), &query), vec!["Bob", "Cid"]);

    let empty = names().limit(0);
    assert!(column_text(&engine(), &empty).is_empty());
}

#[test]
fn test_group_by_ordinal_alias_and_having() {
    let query = QueryDescriptor::new(vec![
        SelectItem::aliased(Expr::column("dept"), "d"),
        SelectItem::aliased(
            Expr::aggregate(AggregateFunction::Sum, Expr::column("salary")),
            "total",
        ),
    ])
    .from_table("employees")
    .group_by(vec![Expr::int(1)])
    .having(Condition::compare(
        Expr::column("total"),
        ComparisonOperator::GreaterThan,
        Expr::int(90),
    ))
    .order_by(vec![OrderByExpr::desc(Expr::column("total"))]);
    assert_eq!(
        query_text(&engine(), &query).unwrap(),
        vec![vec!["eng", "220"], vec!["", "95"]]
    );
}

#[test]
fn test_whole_table_aggregate_produces_one_row() {
    let e = engine();
    let query = QueryDescriptor::new(vec![
        SelectItem::expr(Expr::count_star()),
        SelectItem::expr(Expr::aggregate(AggregateFunction::Max, Expr::column("salary"))),
    ])
    .from_table("employees");
    assert_eq!(query_text(&e, &query).unwrap(), vec![vec!["5", "120"]]);

    assert!(query_text(&e, &query.clone().offset(1)).unwrap().is_empty());
}

#[test]
fn test_wildcard_and_select_without_from() {
    let e = engine();
    let all = QueryDescriptor::new(vec![SelectItem::Wildcard]).from_table("employees");
    let cursor = e.execute(&all).unwrap();
    assert_eq!(cursor.column_names(), vec!["id", "name", "dept", "salary", "hired"]);

    let constant = QueryDescriptor::new(vec![SelectItem::aliased(
        Expr::binary(Expr::int(1), ArithmeticOperator::Add, Expr::int(2)),
        "three",
    )]);
    assert_eq!(query_text(&e, &constant).unwrap(), vec![vec!["3"]]);

    let bare_star = QueryDescriptor::new(vec![SelectItem::Wildcard]);
    assert!(matches!(e.prepare(&bare_star), Err(SqlError::ValidationError { .. })));
}

#[test]
fn test_validation_happens_before_any_row() {
    let e = engine();
    let unknown = QueryDescriptor::new(vec![SelectItem::column("bonus")]).from_table("employees");
    match e.prepare(&unknown) {
        Err(SqlError::ValidationError { column, .. }) => assert_eq!(column.as_deref(), Some("bonus")),
        other => panic!("expected a validation error, got {:?}", other),
    }

    let mixed = QueryDescriptor::new(vec![
        SelectItem::column("name"),
        SelectItem::expr(Expr::count_star()),
    ])
    .from_table("employees");
    assert!(matches!(e.prepare(&mixed), Err(SqlError::ValidationError { .. })));

    let bad_ordinal = names().order_by(vec![OrderByExpr::asc(Expr::int(4))]);
    assert!(matches!(e.prepare(&bad_ordinal), Err(SqlError::ValidationError { .. })));
}
