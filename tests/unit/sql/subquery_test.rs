/*!
# Subquery Support Tests

- Scalar subqueries: SELECT (SELECT title FROM depts WHERE code = e.dept) FROM employees e
- EXISTS / NOT EXISTS correlated with the outer row
- IN subqueries with three-valued results
- nested queries are checked when the statement is prepared
*/

use crate::unit::common::{catalog, column_text, engine, query_text};
use flatsql::datasource::CsvSourceConfig;
use flatsql::sql::ast::{Condition, Expr, OrderByExpr, QueryDescriptor, SelectItem};
use flatsql::sql::{QueryEngine, SqlError};

fn dept_title() -> QueryDescriptor {
    QueryDescriptor::new(vec![SelectItem::column("title")])
        .from_table("depts")
        .with_where(Condition::eq(Expr::column("code"), Expr::column("e.dept")))
}

#[test]
fn test_correlated_scalar_subquery() {
    let query = QueryDescriptor::new(vec![
        SelectItem::column("name"),
        SelectItem::aliased(Expr::subquery(dept_title()), "title"),
    ])
    .from_aliased("employees", "e")
    .order_by(vec![OrderByExpr::asc(Expr::column("id"))]);
    assert_eq!(
        query_text(&engine(), &query).unwrap(),
        vec![
            vec!["Ann", "Engineering"],
            vec!["Bob", "Operations"],
            vec!["Cid", "Engineering"],
            vec!["Dee", "NULL"],
            vec!["Eve", "Operations"],
        ]
    );
}

#[test]
fn test_scalar_subquery_with_many_rows_fails_on_fetch() {
    let inner = QueryDescriptor::new(vec![SelectItem::column("code")]).from_table("depts");
    let query = QueryDescriptor::new(vec![SelectItem::expr(Expr::subquery(inner))])
        .from_table("employees");
    let mut cursor = engine().execute(&query).unwrap();
    assert!(matches!(cursor.next(), Err(SqlError::ExecutionError { .. })));
}

#[test]
fn test_exists_and_not_exists() {
    let e = engine();
    let exists = QueryDescriptor::new(vec![SelectItem::column("name")])
        .from_aliased("employees", "e")
        .with_where(Condition::exists(dept_title()));
    assert_eq!(column_text(&e, &exists), vec!["Ann", "Bob", "Cid", "Eve"]);

    let not_exists = QueryDescriptor::new(vec![SelectItem::column("name")])
        .from_aliased("employees", "e")
        .with_where(Condition::not(Condition::exists(dept_title())));
    assert_eq!(column_text(&e, &not_exists), vec!["Dee"]);
}

#[test]
fn test_in_subquery() {
    let codes = QueryDescriptor::new(vec![SelectItem::column("code")]).from_table("depts");
    let query = QueryDescriptor::new(vec![SelectItem::column("name")])
        .from_table("employees")
        .with_where(Condition::in_subquery(Expr::column("dept"), codes));
    assert_eq!(column_text(&engine(), &query), vec!["Ann", "Bob", "Cid", "Eve"]);
}

#[test]
fn test_in_subquery_needs_one_column() {
    let both = QueryDescriptor::new(vec![SelectItem::Wildcard]).from_table("depts");
    let query = QueryDescriptor::new(vec![SelectItem::column("name")])
        .from_table("employees")
        .with_where(Condition::in_subquery(Expr::column("dept"), both));
    assert!(matches!(
        engine().prepare(&query),
        Err(SqlError::ValidationError { column: None, .. })
    ));
}

#[test]
fn test_unknown_column_in_nested_query_fails_at_prepare() {
    let mut catalog = catalog();
    catalog
        .register_text("nobody", "id
", CsvSourceConfig::default())
        .unwrap();
    let e = QueryEngine::new(catalog);

    let broken = QueryDescriptor::new(vec![SelectItem::column("no_such_col")]).from_table("depts");
    let query = QueryDescriptor::new(vec![SelectItem::column("id")])
        .from_table("nobody")
        .with_where(Condition::exists(broken));
    match e.prepare(&query) {
        Err(SqlError::ValidationError { column, .. }) => {
            assert_eq!(column.as_deref(), Some("no_such_col"))
        }
        other => panic!("expected a validation error, got {:?}", other.err()),
    }

    // two levels down, still reported before any row is read
    let deep = QueryDescriptor::new(vec![SelectItem::column("code")])
        .from_table("depts")
        .with_where(Condition::exists(
            QueryDescriptor::new(vec![SelectItem::column("no_such_col")]).from_table("depts"),
        ));
    let query = QueryDescriptor::new(vec![SelectItem::expr(Expr::subquery(deep))])
        .from_table("nobody");
    assert!(matches!(
        e.prepare(&query),
        Err(SqlError::ValidationError { .. })
    ));
}

#[test]
fn test_nested_query_sees_names_from_every_enclosing_level() {
    // the innermost query reads e.dept two levels out
    let innermost = QueryDescriptor::new(vec![SelectItem::column("title")])
        .from_table("depts")
        .with_where(Condition::and(
            Condition::eq(Expr::column("title"), Expr::column("d.title")),
            Condition::eq(Expr::column("code"), Expr::column("e.dept")),
        ));
    let middle = QueryDescriptor::new(vec![SelectItem::column("code")])
        .from_aliased("depts", "d")
        .with_where(Condition::exists(innermost));
    let query = QueryDescriptor::new(vec![SelectItem::column("name")])
        .from_aliased("employees", "e")
        .with_where(Condition::in_subquery(Expr::column("dept"), middle));
    assert!(engine().prepare(&query).is_ok());
    assert_eq!(column_text(&engine(), &query), vec!["Ann", "Bob", "Cid", "Eve"]);
}
