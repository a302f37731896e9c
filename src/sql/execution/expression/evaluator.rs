//! Expression evaluator for SQL expressions.
//!
//! Value expressions evaluate to `Option<FieldValue>` where `None` is SQL
//! NULL. Conditions evaluate to `Option<bool>` where `None` is unknown, using
//! SQL three-valued logic.

use super::function_registry::FunctionSignature;
use super::functions::find_function;
use super::like::like_matches;
use crate::sql::ast::{Condition, Expr, SelectExpr};
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::aggregation::AggregateAccumulator;
use crate::sql::execution::environment::EvalContext;
use crate::sql::execution::types::FieldValue;
use crate::sql::execution::utils::{FieldValueArithmetic, FieldValueComparator};
use std::cmp::Ordering;

/// Main expression evaluator that handles all SQL expression types
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate a value expression against one row.
    pub fn evaluate_expression_value(
        expr: &Expr,
        ctx: &EvalContext,
    ) -> SqlResult<Option<FieldValue>> {
        match expr {
            Expr::Column(name) => ctx.column(name),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Placeholder(index) => ctx.statement.parameter(*index),
            Expr::Negate(inner) => match Self::evaluate_expression_value(inner, ctx)? {
                Some(value) => FieldValueArithmetic::negate(&value),
                None => Ok(None),
            },
            Expr::BinaryOp { left, op, right } => {
                let left = Self::evaluate_expression_value(left, ctx)?;
                let right = Self::evaluate_expression_value(right, ctx)?;
                match (left, right) {
                    (Some(l), Some(r)) => {
                        FieldValueArithmetic::apply(&l, *op, &r, &ctx.statement.converter)
                    }
                    _ => Ok(None),
                }
            }
            Expr::Function { name, args } => Self::evaluate_function(name, args, ctx),
            Expr::Aggregate(call) => {
                if let Some(rows) = ctx.group {
                    return AggregateAccumulator::evaluate_grouped(call, rows, ctx);
                }
                if let Some(values) = ctx.aggregates {
                    if let Some(value) = values.get(call) {
                        return Ok(value.clone());
                    }
                }
                Err(SqlError::execution_error(format!(
                    "Aggregate function {} used outside of an aggregate query",
                    expr
                )))
            }
            Expr::SearchedCase {
                when_clauses,
                else_clause,
            } => {
                for (condition, result) in when_clauses {
                    if Self::evaluate_condition(condition, ctx)? == Some(true) {
                        return Self::evaluate_expression_value(result, ctx);
                    }
                }
                Self::evaluate_else(else_clause.as_deref(), ctx)
            }
            Expr::SimpleCase {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = Self::evaluate_expression_value(operand, ctx)? {
                    for (when, result) in when_clauses {
                        let Some(candidate) = Self::evaluate_expression_value(when, ctx)? else {
                            continue;
                        };
                        if FieldValueComparator::values_equal(
                            &operand,
                            &candidate,
                            &ctx.statement.converter,
                        ) == Some(true)
                        {
                            return Self::evaluate_expression_value(result, ctx);
                        }
                    }
                }
                Self::evaluate_else(else_clause.as_deref(), ctx)
            }
            Expr::Subquery(query) => {
                let executor = ctx.statement.subqueries.as_ref().ok_or_else(|| {
                    SqlError::execution_error("Sub-queries need a table catalog")
                })?;
                executor.execute_scalar_subquery(query, ctx.row, ctx.statement)
            }
        }
    }

    fn evaluate_else(
        else_clause: Option<&Expr>,
        ctx: &EvalContext,
    ) -> SqlResult<Option<FieldValue>> {
        match else_clause {
            Some(expr) => Self::evaluate_expression_value(expr, ctx),
            None => Ok(None),
        }
    }

    fn evaluate_function(
        name: &str,
        args: &[Expr],
        ctx: &EvalContext,
    ) -> SqlResult<Option<FieldValue>> {
        let upper = name.to_uppercase();

        // COALESCE stops evaluating at the first non-null argument
        if matches!(upper.as_str(), "COALESCE" | "IFNULL" | "NVL") {
            for arg in args {
                if let Some(value) = Self::evaluate_expression_value(arg, ctx)? {
                    return Ok(Some(value));
                }
            }
            return Ok(None);
        }

        let values = args
            .iter()
            .map(|arg| Self::evaluate_expression_value(arg, ctx))
            .collect::<SqlResult<Vec<_>>>()?;

        if let Some(def) = find_function(&upper) {
            if !def.accepts(values.len()) {
                return Err(SqlError::execution_error(format!(
                    "Function {} does not accept {} arguments",
                    def.name,
                    values.len()
                )));
            }
            return (def.handler)(&values, ctx.statement);
        }

        let signature: &FunctionSignature = ctx
            .statement
            .functions
            .resolve(&upper, values.len())
            .ok_or_else(|| SqlError::unknown_function(name))?;
        signature.invoke(values, &ctx.statement.converter)
    }

    /// Evaluate a condition with three-valued logic.
    pub fn evaluate_condition(condition: &Condition, ctx: &EvalContext) -> SqlResult<Option<bool>> {
        let converter = &ctx.statement.converter;
        match condition {
            Condition::Comparison { left, op, right } => {
                let left = Self::evaluate_expression_value(left, ctx)?;
                let right = Self::evaluate_expression_value(right, ctx)?;
                Ok(FieldValueComparator::compare_with_operator(
                    left.as_ref(),
                    right.as_ref(),
                    *op,
                    converter,
                ))
            }
            Condition::And(left, right) => {
                let left = Self::evaluate_condition(left, ctx)?;
                if left == Some(false) {
                    return Ok(Some(false));
                }
                let right = Self::evaluate_condition(right, ctx)?;
                Ok(match (left, right) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                })
            }
            Condition::Or(left, right) => {
                let left = Self::evaluate_condition(left, ctx)?;
                if left == Some(true) {
                    return Ok(Some(true));
                }
                let right = Self::evaluate_condition(right, ctx)?;
                Ok(match (left, right) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                })
            }
            Condition::Not(inner) => Ok(Self::evaluate_condition(inner, ctx)?.map(|b| !b)),
            Condition::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = Self::evaluate_expression_value(expr, ctx)?;
                let low = Self::evaluate_expression_value(low, ctx)?;
                let high = Self::evaluate_expression_value(high, ctx)?;
                let (Some(value), Some(low), Some(high)) = (value, low, high) else {
                    return Ok(None);
                };
                let above = FieldValueComparator::compare(&low, &value, converter);
                let below = FieldValueComparator::compare(&value, &high, converter);
                let result = match (above, below) {
                    (Some(a), Some(b)) => Some(a != Ordering::Greater && b != Ordering::Greater),
                    _ => None,
                };
                Ok(negate_if(result, *negated))
            }
            Condition::InList {
                expr,
                list,
                negated,
            } => {
                let Some(needle) = Self::evaluate_expression_value(expr, ctx)? else {
                    return Ok(None);
                };
                let mut saw_null = false;
                for item in list {
                    match Self::evaluate_expression_value(item, ctx)? {
                        None => saw_null = true,
                        Some(candidate) => {
                            // incomparable members are skipped
                            if FieldValueComparator::values_equal(&needle, &candidate, converter)
                                == Some(true)
                            {
                                return Ok(Some(!*negated));
                            }
                        }
                    }
                }
                let result = if saw_null { None } else { Some(false) };
                Ok(negate_if(result, *negated))
            }
            Condition::InSubquery {
                expr,
                query,
                negated,
            } => {
                let Some(needle) = Self::evaluate_expression_value(expr, ctx)? else {
                    return Ok(None);
                };
                let executor = ctx.statement.subqueries.as_ref().ok_or_else(|| {
                    SqlError::execution_error("Sub-queries need a table catalog")
                })?;
                let result = executor.execute_in_subquery(&needle, query, ctx.row, ctx.statement)?;
                Ok(negate_if(result, *negated))
            }
            Condition::Exists { query, negated } => {
                let executor = ctx.statement.subqueries.as_ref().ok_or_else(|| {
                    SqlError::execution_error("Sub-queries need a table catalog")
                })?;
                let found = executor.execute_exists_subquery(query, ctx.row, ctx.statement)?;
                Ok(Some(found != *negated))
            }
            Condition::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                let value = Self::evaluate_expression_value(expr, ctx)?;
                let pattern = Self::evaluate_expression_value(pattern, ctx)?;
                let (Some(value), Some(pattern)) = (value, pattern) else {
                    return Ok(None);
                };
                let text = match value {
                    FieldValue::String(s) => s,
                    other => converter.format(&other),
                };
                let pattern = match pattern {
                    FieldValue::String(s) => s,
                    other => converter.format(&other),
                };
                let matched = like_matches(&text, &pattern, *escape)?;
                Ok(Some(matched != *negated))
            }
            Condition::IsNull { expr, negated } => {
                let value = Self::evaluate_expression_value(expr, ctx)?;
                Ok(Some(value.is_none() != *negated))
            }
            Condition::Truth(expr) => match Self::evaluate_expression_value(expr, ctx)? {
                None => Ok(None),
                Some(FieldValue::Boolean(b)) => Ok(Some(b)),
                Some(FieldValue::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
                Some(FieldValue::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
                Some(other) => Err(SqlError::type_error(
                    "BOOLEAN",
                    other.type_name(),
                    Some(other.to_string()),
                )),
            },
        }
    }

    /// Evaluate a select-list entry; conditions become BOOLEAN or NULL.
    pub fn evaluate_select_expr(
        expr: &SelectExpr,
        ctx: &EvalContext,
    ) -> SqlResult<Option<FieldValue>> {
        match expr {
            SelectExpr::Value(e) => Self::evaluate_expression_value(e, ctx),
            SelectExpr::Condition(c) => {
                Ok(Self::evaluate_condition(c, ctx)?.map(FieldValue::Boolean))
            }
        }
    }

    /// True only when the condition is exactly true
    pub fn is_satisfied(condition: &Condition, ctx: &EvalContext) -> SqlResult<bool> {
        Ok(Self::evaluate_condition(condition, ctx)? == Some(true))
    }
}

fn negate_if(result: Option<bool>, negated: bool) -> Option<bool> {
    result.map(|b| b != negated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::{AggregateFunction, ArithmeticOperator, ComparisonOperator};
    use crate::sql::execution::aggregation::AccumulatorManager;
    use crate::sql::execution::convert::TypeConverter;
    use crate::sql::execution::environment::{RowEnvironment, RowLayout, StatementContext};
    use crate::sql::execution::expression::function_registry::{
        FunctionRegistry, FunctionSignature,
    };
    use crate::sql::execution::types::DataType;
    use std::sync::Arc;

    fn statement() -> StatementContext {
        let mut registry = FunctionRegistry::new();
        registry
            .register(FunctionSignature::new(
                "add_one",
                vec![DataType::Long],
                DataType::Long,
                |args| Ok(args[0].as_ref().and_then(|v| v.as_i64()).map(|i| FieldValue::Long(i + 1))),
            ))
            .unwrap();
        StatementContext::new(Arc::new(TypeConverter::default()), Arc::new(registry))
    }

    fn row(a: Option<FieldValue>, b: Option<FieldValue>) -> RowEnvironment {
        RowLayout::new(&["A".to_string(), "B".to_string()], None).bind(vec![a, b])
    }

    fn int(i: i32) -> Option<FieldValue> {
        Some(FieldValue::Integer(i))
    }

    fn gt(l: Expr, r: Expr) -> Condition {
        Condition::compare(l, ComparisonOperator::GreaterThan, r)
    }

    #[test]
    fn test_three_valued_and_or() {
        let st = statement();
        let env = row(int(1), None);
        let ctx = EvalContext::new(&env, &st);
        let unknown = gt(Expr::column("B"), Expr::int(0));
        let true_c = gt(Expr::column("A"), Expr::int(0));
        let false_c = gt(Expr::column("A"), Expr::int(5));

        let eval = |c: Condition| ExpressionEvaluator::evaluate_condition(&c, &ctx).unwrap();
        assert_eq!(eval(Condition::and(unknown.clone(), false_c.clone())), Some(false));
        assert_eq!(eval(Condition::and(unknown.clone(), true_c.clone())), None);
        assert_eq!(eval(Condition::or(unknown.clone(), true_c.clone())), Some(true));
        assert_eq!(eval(Condition::or(unknown.clone(), false_c)), None);
        assert_eq!(eval(Condition::not(unknown)), None);
    }

    #[test]
    fn test_in_list_and_between() {
        let st = statement();
        let env = row(int(3), None);
        let ctx = EvalContext::new(&env, &st);
        let eval = |c: Condition| ExpressionEvaluator::evaluate_condition(&c, &ctx).unwrap();

        assert_eq!(
            eval(Condition::in_list(
                Expr::column("A"),
                vec![Expr::string("x"), Expr::int(3)]
            )),
            Some(true)
        );
        assert_eq!(
            eval(Condition::in_list(Expr::column("A"), vec![Expr::null(), Expr::int(4)])),
            None
        );
        assert_eq!(
            eval(Condition::between(Expr::column("A"), Expr::int(1), Expr::int(3))),
            Some(true)
        );
        assert_eq!(
            eval(Condition::between(Expr::column("A"), Expr::int(4), Expr::int(9))),
            Some(false)
        );
        assert_eq!(
            eval(Condition::between(Expr::column("A"), Expr::column("B"), Expr::int(9))),
            None
        );
    }

    #[test]
    fn test_like_formats_non_text_values() {
        let st = statement();
        let env = row(int(12345), None);
        let ctx = EvalContext::new(&env, &st);
        let cond = Condition::like(Expr::column("A"), "12%");
        assert_eq!(ExpressionEvaluator::evaluate_condition(&cond, &ctx).unwrap(), Some(true));
    }

    #[test]
    fn test_case_expressions() {
        let st = statement();
        let env = row(int(2), None);
        let ctx = EvalContext::new(&env, &st);
        let simple = Expr::SimpleCase {
            operand: Box::new(Expr::column("A")),
            when_clauses: vec![
                (Expr::int(1), Expr::string("one")),
                (Expr::int(2), Expr::string("two")),
            ],
            else_clause: None,
        };
        assert_eq!(
            ExpressionEvaluator::evaluate_expression_value(&simple, &ctx).unwrap(),
            Some(FieldValue::String("two".into()))
        );
        let searched = Expr::SearchedCase {
            when_clauses: vec![(gt(Expr::column("B"), Expr::int(0)), Expr::string("pos"))],
            else_clause: Some(Box::new(Expr::string("other"))),
        };
        assert_eq!(
            ExpressionEvaluator::evaluate_expression_value(&searched, &ctx).unwrap(),
            Some(FieldValue::String("other".into()))
        );
    }

    #[test]
    fn test_functions_and_user_functions() {
        let st = statement();
        let env = row(Some(FieldValue::String("41".into())), None);
        let ctx = EvalContext::new(&env, &st);
        let call = Expr::function("add_one", vec![Expr::column("A")]);
        assert_eq!(
            ExpressionEvaluator::evaluate_expression_value(&call, &ctx).unwrap(),
            Some(FieldValue::Long(42))
        );
        let coalesce = Expr::function("coalesce", vec![Expr::column("B"), Expr::int(7)]);
        assert_eq!(
            ExpressionEvaluator::evaluate_expression_value(&coalesce, &ctx).unwrap(),
            int(7)
        );
        let missing = Expr::function("nope", vec![]);
        assert!(ExpressionEvaluator::evaluate_expression_value(&missing, &ctx).is_err());
    }

    #[test]
    fn test_null_propagates_through_arithmetic() {
        let st = statement();
        let env = row(int(1), None);
        let ctx = EvalContext::new(&env, &st);
        let sum = Expr::binary(Expr::column("A"), ArithmeticOperator::Add, Expr::column("B"));
        assert_eq!(ExpressionEvaluator::evaluate_expression_value(&sum, &ctx).unwrap(), None);
    }

    #[test]
    fn test_aggregate_modes() {
        let st = statement();
        let rows = vec![row(int(1), None), row(int(4), None)];
        let max = Expr::aggregate(AggregateFunction::Max, Expr::column("A"));

        let outside = EvalContext::new(&rows[0], &st);
        assert!(ExpressionEvaluator::evaluate_expression_value(&max, &outside).is_err());

        let grouped = EvalContext::new(&rows[0], &st).with_group(&rows);
        assert_eq!(
            ExpressionEvaluator::evaluate_expression_value(&max, &grouped).unwrap(),
            int(4)
        );

        let Expr::Aggregate(call) = &max else { unreachable!() };
        let mut manager = AccumulatorManager::new([call]);
        for r in &rows {
            manager.process_row(&EvalContext::new(r, &st)).unwrap();
        }
        let values = manager.values();
        let empty = RowEnvironment::new();
        let streaming = EvalContext::new(&empty, &st).with_aggregates(&values);
        assert_eq!(
            ExpressionEvaluator::evaluate_expression_value(&max, &streaming).unwrap(),
            int(4)
        );
    }
}
