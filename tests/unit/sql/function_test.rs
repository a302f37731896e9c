//! Built-in scalar functions, user functions, CASE and placeholders through
//! the whole engine.

use crate::unit::common::{catalog, column_text, engine, query_text};
use flatsql::sql::ast::{
    ArithmeticOperator, ComparisonOperator, Condition, Expr, QueryDescriptor, SelectItem,
};
use flatsql::sql::execution::expression::{FunctionRegistry, FunctionSignature};
use flatsql::sql::{DataType, FieldValue, QueryEngine, SqlError};

fn first_employee(items: Vec<SelectItem>) -> QueryDescriptor {
    QueryDescriptor::new(items)
        .from_table("employees")
        .with_where(Condition::eq(Expr::column("id"), Expr::int(1)))
}

#[test]
fn test_builtin_functions() {
    let query = first_employee(vec![
        SelectItem::expr(Expr::function("upper", vec![Expr::column("name")])),
        SelectItem::expr(Expr::function("length", vec![Expr::column("name")])),
        SelectItem::expr(Expr::function("year", vec![Expr::column("hired")])),
        SelectItem::expr(Expr::function(
            "coalesce",
            vec![Expr::null(), Expr::column("dept")],
        )),
        SelectItem::expr(Expr::binary(
            Expr::column("name"),
            ArithmeticOperator::Concat,
            Expr::string("!"),
        )),
    ]);
    assert_eq!(
        query_text(&engine(), &query).unwrap(),
        vec![vec!["ANN", "3", "2019", "eng", "Ann!"]]
    );
}

#[test]
fn test_searched_case() {
    let band = Expr::SearchedCase {
        when_clauses: vec![
            (
                Condition::compare(
                    Expr::column("salary"),
                    ComparisonOperator::GreaterThanOrEqual,
                    Expr::int(100),
                ),
                Expr::string("high"),
            ),
            (Condition::is_null(Expr::column("salary")), Expr::string("unknown")),
        ],
        else_clause: Some(Box::new(Expr::string("low"))),
    };
    let query = QueryDescriptor::new(vec![SelectItem::expr(band)]).from_table("employees");
    assert_eq!(
        column_text(&engine(), &query),
        vec!["high", "low", "high", "low", "unknown"]
    );
}

#[test]
fn test_user_function_resolved_at_prepare() {
    let mut functions = FunctionRegistry::new();
    functions
        .register(FunctionSignature::new(
            "double_it",
            vec![DataType::Long],
            DataType::Long,
            |args| Ok(args[0].as_ref().and_then(FieldValue::as_i64).map(|v| FieldValue::Long(v * 2))),
        ))
        .unwrap();
    let e = QueryEngine::new(catalog()).with_functions(functions);

    let query = first_employee(vec![SelectItem::expr(Expr::function(
        "DOUBLE_IT",
        vec![Expr::column("salary")],
    ))]);
    assert_eq!(column_text(&e, &query), vec!["240"]);

    let wrong_arity = first_employee(vec![SelectItem::expr(Expr::function("double_it", vec![]))]);
    assert!(matches!(e.prepare(&wrong_arity), Err(SqlError::ValidationError { .. })));

    let unknown = first_employee(vec![SelectItem::expr(Expr::function("triple_it", vec![]))]);
    assert!(matches!(engine().prepare(&unknown), Err(SqlError::ValidationError { .. })));
}

#[test]
fn test_builtins_cannot_be_redefined() {
    let mut functions = FunctionRegistry::new();
    let result = functions.register(FunctionSignature::new(
        "upper",
        vec![DataType::String],
        DataType::String,
        |_| Ok(None),
    ));
    assert!(matches!(result, Err(SqlError::ConfigurationError { .. })));
}

#[test]
fn test_placeholders() {
    let query = QueryDescriptor::new(vec![SelectItem::column("name")])
        .from_table("employees")
        .with_where(Condition::between(
            Expr::column("salary"),
            Expr::Placeholder(1),
            Expr::Placeholder(2),
        ))
        .placeholders(2);
    let mut prepared = engine().prepare(&query).unwrap();
    assert_eq!(prepared.parameter_count(), 2);

    prepared.set_parameter(1, Some(FieldValue::Integer(90))).unwrap();
    assert!(matches!(prepared.execute(), Err(SqlError::UsageError { .. })));

    prepared.set_parameter(2, Some(FieldValue::Integer(100))).unwrap();
    let names: Vec<String> = prepared
        .execute()
        .unwrap()
        .fetch_all()
        .unwrap()
        .into_iter()
        .map(|row| row[0].as_ref().map(|v| v.to_string()).unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["Cid", "Dee"]);

    // NULL bound explicitly is unknown, not unset
    prepared.set_parameter(2, None).unwrap();
    assert!(prepared.execute().unwrap().fetch_all().unwrap().is_empty());
}
