//! Nested query execution against the table catalog
//!
//! Nested queries are planned once when the statement is prepared, to
//! report unknown columns and wrong result widths early. Each evaluation
//! then opens the inner table afresh and plans the inner query with the
//! enclosing row's names in scope, so correlated references resolve against
//! the current outer row.

use super::context::{ExecutionGuard, ProcessorContext, RowStream};
use super::select::{QueryPlan, SelectProcessor, TableScope};
use super::{open_source, table_scope, QueryPipeline};
use crate::datasource::catalog::TableCatalog;
use crate::sql::ast::{QueryDescriptor, SubqueryKind};
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::environment::{RowEnvironment, StatementContext};
use crate::sql::execution::expression::function_registry::FunctionRegistry;
use crate::sql::execution::expression::subquery_executor::SubqueryExecutor;
use crate::sql::execution::types::FieldValue;
use crate::sql::execution::utils::FieldValueComparator;
use std::sync::Arc;

/// Runs scalar, EXISTS and IN sub-queries over catalog tables.
#[derive(Debug, Clone)]
pub struct CatalogSubqueryExecutor {
    catalog: Arc<TableCatalog>,
    functions: Arc<FunctionRegistry>,
}

impl CatalogSubqueryExecutor {
    pub fn new(catalog: Arc<TableCatalog>, functions: Arc<FunctionRegistry>) -> Self {
        Self { catalog, functions }
    }

    /// Plan every query nested in `query` against its own table, with the
    /// names of `scope` visible as outer references, so that unknown columns
    /// and wrong result widths fail before any row is read.
    pub fn validate_nested(&self, query: &QueryDescriptor, scope: &TableScope) -> SqlResult<()> {
        for (nested, kind) in query.subqueries() {
            let source = open_source(&self.catalog, nested.from.as_ref())?;
            let outer = scope.available.iter().chain(&scope.outer).cloned().collect();
            let (mut inner, _) = table_scope(source.as_ref(), nested.from.as_ref(), outer);
            // outer names are only known when the enclosing table's are
            inner.static_columns &= scope.static_columns;
            let plan = SelectProcessor::plan(nested, &inner, &self.functions)?;
            check_width(&plan, kind)?;
            self.validate_nested(nested, &inner)?;
        }
        Ok(())
    }

    fn open(
        &self,
        query: &QueryDescriptor,
        current_row: &RowEnvironment,
        statement: &StatementContext,
        kind: SubqueryKind,
    ) -> SqlResult<QueryPipeline> {
        let source = open_source(&self.catalog, query.from.as_ref())?;
        let mut outer: Vec<String> = current_row.keys().map(str::to_string).collect();
        if let Some(parent) = &statement.outer_row {
            outer.extend(parent.keys().map(str::to_string));
        }
        let (scope, layout) = table_scope(source.as_ref(), query.from.as_ref(), outer);
        let plan = SelectProcessor::plan(query, &scope, &self.functions)?;
        check_width(&plan, kind)?;

        let mut nested = statement.for_subquery(current_row);
        nested.converter = source.converter();
        Ok(QueryPipeline::new(
            Arc::new(plan),
            RowStream::new(source, layout),
            ProcessorContext::new(nested, ExecutionGuard::unbounded()),
            0,
        ))
    }
}

fn check_width(plan: &QueryPlan, kind: SubqueryKind) -> SqlResult<()> {
    match kind.single_column() {
        Some(label) if plan.columns.len() != 1 => Err(SqlError::validation_error(
            format!(
                "{} subquery must select exactly one column, found {}",
                label,
                plan.columns.len()
            ),
            None,
        )),
        _ => Ok(()),
    }
}

impl SubqueryExecutor for CatalogSubqueryExecutor {
    fn execute_scalar_subquery(
        &self,
        query: &QueryDescriptor,
        current_row: &RowEnvironment,
        statement: &StatementContext,
    ) -> SqlResult<Option<FieldValue>> {
        let mut pipeline = self.open(query, current_row, statement, SubqueryKind::Scalar)?;
        let Some(mut first) = pipeline.next_row()? else {
            return Ok(None);
        };
        if pipeline.next_row()?.is_some() {
            return Err(SqlError::execution_error(
                "Scalar subquery returned more than one row",
            ));
        }
        Ok(first.pop().flatten())
    }

    fn execute_exists_subquery(
        &self,
        query: &QueryDescriptor,
        current_row: &RowEnvironment,
        statement: &StatementContext,
    ) -> SqlResult<bool> {
        let mut pipeline = self.open(query, current_row, statement, SubqueryKind::Exists)?;
        let found = pipeline.next_row()?.is_some();
        pipeline.close();
        Ok(found)
    }

    fn execute_in_subquery(
        &self,
        value: &FieldValue,
        query: &QueryDescriptor,
        current_row: &RowEnvironment,
        statement: &StatementContext,
    ) -> SqlResult<Option<bool>> {
        let mut pipeline = self.open(query, current_row, statement, SubqueryKind::In)?;
        let mut saw_null = false;
        while let Some(mut row) = pipeline.next_row()? {
            match row.pop().flatten() {
                None => saw_null = true,
                Some(candidate) => {
                    if FieldValueComparator::values_equal(value, &candidate, &statement.converter)
                        == Some(true)
                    {
                        pipeline.close();
                        return Ok(Some(true));
                    }
                }
            }
        }
        Ok(if saw_null { None } else { Some(false) })
    }
}
