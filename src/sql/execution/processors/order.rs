//! ORDER BY Sorting Processor
//!
//! Sort keys are evaluated once per row, then rows are sorted with a stable
//! sort on the precomputed keys so rows with equal keys keep their input
//! order. NULL keys sort after every value in both directions.

use super::select::SortKey;
use crate::sql::ast::OrderDirection;
use crate::sql::error::SqlResult;
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::environment::EvalContext;
use crate::sql::execution::expression::ExpressionEvaluator;
use crate::sql::execution::types::FieldValue;
use crate::sql::execution::utils::FieldValueComparator;
use std::cmp::Ordering;

/// Processor for ORDER BY sorting operations
pub struct OrderProcessor;

impl OrderProcessor {
    /// Evaluate every sort key for the row or group in `ctx`.
    pub fn sort_keys(order_by: &[SortKey], ctx: &EvalContext) -> SqlResult<Vec<Option<FieldValue>>> {
        order_by
            .iter()
            .map(|key| ExpressionEvaluator::evaluate_select_expr(&key.expr, ctx))
            .collect()
    }

    /// Sort `rows` by their precomputed keys.
    pub fn sort<T>(
        mut rows: Vec<(T, Vec<Option<FieldValue>>)>,
        order_by: &[SortKey],
        converter: &TypeConverter,
    ) -> Vec<T> {
        if !order_by.is_empty() {
            rows.sort_by(|(_, a), (_, b)| Self::compare_keys(a, b, order_by, converter));
        }
        rows.into_iter().map(|(row, _)| row).collect()
    }

    fn compare_keys(
        left: &[Option<FieldValue>],
        right: &[Option<FieldValue>],
        order_by: &[SortKey],
        converter: &TypeConverter,
    ) -> Ordering {
        for ((a, b), key) in left.iter().zip(right).zip(order_by) {
            let ordering = match (a, b) {
                (Some(_), Some(_)) => {
                    let ordering = FieldValueComparator::sort_order(a.as_ref(), b.as_ref(), converter);
                    match key.direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    }
                }
                // nulls last regardless of direction
                _ => FieldValueComparator::sort_order(a.as_ref(), b.as_ref(), converter),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
