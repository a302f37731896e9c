/*!
# Subquery Execution Trait

The evaluator does not know where tables come from. Nested queries are handed
to a [`SubqueryExecutor`] stored on the statement context, which runs them as
independent queries correlated with the current row.
*/

use crate::sql::ast::QueryDescriptor;
use crate::sql::error::SqlResult;
use crate::sql::execution::environment::{RowEnvironment, StatementContext};
use crate::sql::execution::types::FieldValue;

/// Trait for executing subqueries within expression evaluation
pub trait SubqueryExecutor {
    /// Execute a scalar subquery.
    ///
    /// Zero rows yield NULL. A second row is an execution error, raised as
    /// soon as it is read.
    fn execute_scalar_subquery(
        &self,
        query: &QueryDescriptor,
        current_row: &RowEnvironment,
        statement: &StatementContext,
    ) -> SqlResult<Option<FieldValue>>;

    /// True when the subquery produces at least one row. Stops at the first row.
    fn execute_exists_subquery(
        &self,
        query: &QueryDescriptor,
        current_row: &RowEnvironment,
        statement: &StatementContext,
    ) -> SqlResult<bool>;

    /// Three-valued IN: `Some(true)` on the first equal row, `None` when no
    /// row matched but a NULL was seen, otherwise `Some(false)`. Rows whose
    /// value cannot be compared with `value` are skipped.
    fn execute_in_subquery(
        &self,
        value: &FieldValue,
        query: &QueryDescriptor,
        current_row: &RowEnvironment,
        statement: &StatementContext,
    ) -> SqlResult<Option<bool>>;
}
