//! Aggregation Function Validation
//!
//! Validates that aggregate functions are used correctly:
//! - no aggregates in WHERE or GROUP BY
//! - no aggregate nested inside another aggregate's argument
//! - with GROUP BY, every column read outside an aggregate is a grouping column
//!   or part of a grouping expression
//! - without GROUP BY, a query that aggregates reads no column outside an
//!   aggregate

use crate::sql::ast::{AggregateCall, Condition, Expr, SelectExpr};
use crate::sql::error::{SqlError, SqlResult};

/// Validator for SQL aggregation functions and GROUP BY rules
pub struct AggregationValidator;

impl AggregationValidator {
    /// Reject aggregates in a clause that is evaluated per source row.
    pub fn validate_no_aggregates(expr: &SelectExpr, clause: &str) -> SqlResult<()> {
        let found = match expr {
            SelectExpr::Value(e) => e.aggregate_functions(),
            SelectExpr::Condition(c) => c.aggregate_functions(),
        };
        match found.first() {
            Some(call) => Err(SqlError::validation_error(
                format!(
                    "Aggregate function {} is not allowed in {}",
                    Expr::Aggregate((*call).clone()),
                    clause
                ),
                None,
            )),
            None => Ok(()),
        }
    }

    /// Reject `SUM(COUNT(x))` and the like.
    pub fn validate_not_nested(calls: &[&AggregateCall]) -> SqlResult<()> {
        for call in calls {
            if let Some(argument) = &call.argument {
                if argument.contains_aggregate() {
                    return Err(SqlError::validation_error(
                        format!(
                            "Aggregate functions cannot be nested: {}",
                            Expr::Aggregate((*call).clone())
                        ),
                        None,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Check that `expr`, evaluated once per group, only reads grouped
    /// columns outside of aggregates. With an empty `group_by` the whole
    /// table is one group and no column may be read outside an aggregate.
    pub fn validate_grouped(expr: &SelectExpr, group_by: &[SelectExpr], clause: &str) -> SqlResult<()> {
        let ungrouped = if group_by.contains(expr) {
            None
        } else {
            match expr {
                SelectExpr::Value(e) => ungrouped_in_expr(e, group_by),
                SelectExpr::Condition(c) => ungrouped_in_condition(c, group_by),
            }
        };
        match ungrouped {
            Some(column) if group_by.is_empty() => Err(SqlError::validation_error(
                format!(
                    "Column in {} must be used in an aggregate function when the query aggregates without GROUP BY",
                    clause
                ),
                Some(column.to_string()),
            )),
            Some(column) => Err(SqlError::validation_error(
                format!(
                    "Column in {} must appear in the GROUP BY clause or be used in an aggregate function",
                    clause
                ),
                Some(column.to_string()),
            )),
            None => Ok(()),
        }
    }
}

/// Columns compare by their unqualified name
fn same_column(a: &str, b: &str) -> bool {
    let base = |s: &str| s.rsplit('.').next().unwrap_or(s).to_string();
    base(a).eq_ignore_ascii_case(&base(b))
}

fn ungrouped_in_expr<'a>(expr: &'a Expr, group_by: &[SelectExpr]) -> Option<&'a str> {
    if group_by
        .iter()
        .any(|g| matches!(g, SelectExpr::Value(v) if v == expr))
    {
        return None;
    }
    match expr {
        Expr::Aggregate(_) => None,
        Expr::Column(name) => {
            let grouped = group_by
                .iter()
                .any(|g| matches!(g, SelectExpr::Value(Expr::Column(c)) if same_column(c, name)));
            (!grouped).then_some(name.as_str())
        }
        _ => expr
            .value_children()
            .into_iter()
            .find_map(|child| ungrouped_in_expr(child, group_by))
            .or_else(|| {
                expr.condition_children()
                    .into_iter()
                    .find_map(|cond| ungrouped_in_condition(cond, group_by))
            }),
    }
}

fn ungrouped_in_condition<'a>(condition: &'a Condition, group_by: &[SelectExpr]) -> Option<&'a str> {
    if group_by
        .iter()
        .any(|g| matches!(g, SelectExpr::Condition(c) if c == condition))
    {
        return None;
    }
    condition
        .value_children()
        .into_iter()
        .find_map(|child| ungrouped_in_expr(child, group_by))
        .or_else(|| {
            condition
                .condition_children()
                .into_iter()
                .find_map(|cond| ungrouped_in_condition(cond, group_by))
        })
}
