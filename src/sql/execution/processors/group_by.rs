//! GROUP BY Processing
//!
//! Partitions filtered rows by their grouping key. Groups come out in the
//! order their first row was seen, and member rows keep input order.

use crate::sql::ast::SelectExpr;
use crate::sql::error::SqlResult;
use crate::sql::execution::environment::{EvalContext, RowEnvironment, StatementContext};
use crate::sql::execution::expression::ExpressionEvaluator;
use crate::sql::execution::types::FieldValue;
use std::collections::HashMap;

/// Grouping key; NULL values group together
pub type GroupKey = Vec<Option<FieldValue>>;

/// One group of rows sharing a key
#[derive(Debug, Clone)]
pub struct Group {
    pub key: GroupKey,
    pub rows: Vec<RowEnvironment>,
}

/// Accumulates rows into groups
#[derive(Debug, Default)]
pub struct GroupByProcessor {
    index: HashMap<GroupKey, usize>,
    groups: Vec<Group>,
}

impl GroupByProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the grouping key for `row` and add it to its group.
    pub fn add_row(
        &mut self,
        group_by: &[SelectExpr],
        row: RowEnvironment,
        statement: &StatementContext,
    ) -> SqlResult<()> {
        let key = {
            let ctx = EvalContext::new(&row, statement);
            group_by
                .iter()
                .map(|expr| ExpressionEvaluator::evaluate_select_expr(expr, &ctx))
                .collect::<SqlResult<GroupKey>>()?
        };
        match self.index.get(&key) {
            Some(&position) => self.groups[position].rows.push(row),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push(Group {
                    key,
                    rows: vec![row],
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Finished groups in first-seen order
    pub fn into_groups(self) -> Vec<Group> {
        log::debug!("GROUP BY produced {} groups", self.groups.len());
        self.groups
    }
}
