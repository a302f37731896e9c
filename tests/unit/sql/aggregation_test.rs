/*!
# Aggregate Function Tests

Every aggregate must give the same answer whether it is fed row by row in a
whole-table query or replayed over the member rows of a group.
*/

use crate::unit::common::{engine, query_text};
use flatsql::sql::ast::{AggregateFunction, Expr, QueryDescriptor, SelectItem};

fn aggregates() -> Vec<Expr> {
    vec![
        Expr::count_star(),
        Expr::aggregate(AggregateFunction::Count, Expr::column("salary")),
        Expr::aggregate(AggregateFunction::Sum, Expr::column("salary")),
        Expr::aggregate(AggregateFunction::Avg, Expr::column("salary")),
        Expr::aggregate(AggregateFunction::Min, Expr::column("name")),
        Expr::aggregate(AggregateFunction::Max, Expr::column("hired")),
        Expr::string_agg(Expr::column("name"), "|", false),
        Expr::aggregate(AggregateFunction::ArrayAgg, Expr::column("id")),
        Expr::aggregate_distinct(AggregateFunction::Count, Expr::column("dept")),
    ]
}

fn select_all() -> Vec<SelectItem> {
    aggregates().into_iter().map(SelectItem::expr).collect()
}

#[test]
fn test_streaming_and_grouped_agree() {
    let e = engine();
    let streaming = QueryDescriptor::new(select_all()).from_table("employees");
    // a constant grouping key puts every row in one group
    let grouped = QueryDescriptor::new(select_all())
        .from_table("employees")
        .group_by(vec![Expr::string("all")]);

    let streamed = query_text(&e, &streaming).unwrap();
    assert_eq!(streamed, query_text(&e, &grouped).unwrap());
    assert_eq!(
        streamed[0][..7],
        [
            "5",
            "4",
            "395",
            "98.75",
            "Ann",
            "2022-05-20",
            "Ann|Bob|Cid|Dee|Eve"
        ]
    );
    assert_eq!(streamed[0][8], "3");
}

#[test]
fn test_empty_input() {
    let query = QueryDescriptor::new(select_all())
        .from_table("employees")
        .with_where(flatsql::sql::ast::Condition::is_null(Expr::column("id")));
    let rows = query_text(&engine(), &query).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "0");
    assert_eq!(rows[0][1], "0");
    assert!(rows[0][2..8].iter().all(|v| v == "NULL"));
}

#[test]
fn test_per_group_results() {
    let query = QueryDescriptor::new(vec![
        SelectItem::column("dept"),
        SelectItem::expr(Expr::string_agg(Expr::column("name"), ",", false)),
        SelectItem::expr(Expr::aggregate(AggregateFunction::Avg, Expr::column("salary"))),
    ])
    .from_table("employees")
    .group_by(vec![Expr::column("dept")]);
    assert_eq!(
        query_text(&engine(), &query).unwrap(),
        vec![
            vec!["eng", "Ann,Cid", "110"],
            vec!["ops", "Bob,Eve", "80"],
            vec!["", "Dee", "95"],
        ]
    );
}
