/*!
# Query Engine

Entry point for running [`QueryDescriptor`]s against a [`TableCatalog`].

[`QueryEngine::prepare`] opens the source once to learn its columns, plans
and validates the query, and infers the output column metadata; every
validation and configuration error surfaces here, before a row is read.
[`PreparedQuery::execute`] binds placeholders and returns a
[`ResultCursor`]. The first execution reuses the source opened during
preparation; later executions reopen the table through the catalog.

```rust
use flatsql::datasource::{CsvSourceConfig, TableCatalog};
use flatsql::sql::ast::{Condition, ComparisonOperator, Expr, QueryDescriptor, SelectItem};
use flatsql::sql::execution::engine::QueryEngine;

let mut catalog = TableCatalog::new();
catalog
    .register_text("t", "name,age\nann,31\nbob,17\n", CsvSourceConfig::default().infer_types())
    .unwrap();

let query = QueryDescriptor::new(vec![SelectItem::column("name")])
    .from_table("t")
    .with_where(Condition::compare(
        Expr::column("age"),
        ComparisonOperator::GreaterThan,
        Expr::int(18),
    ));
let mut cursor = QueryEngine::new(catalog).execute(&query).unwrap();
assert!(cursor.next().unwrap());
assert_eq!(cursor.get(0).unwrap().map(|v| v.to_string()), Some("ann".to_string()));
assert!(!cursor.next().unwrap());
```
*/

use super::cursor::{describe_columns, ResultCursor};
use super::environment::{RowLayout, StatementContext};
use super::expression::function_registry::FunctionRegistry;
use super::processors::{
    open_source, table_scope, CancelHandle, CatalogSubqueryExecutor, ExecutionGuard,
    ProcessorContext, QueryPipeline, QueryPlan, RowStream, SelectProcessor,
};
use super::types::{FieldValue, ResultColumn};
use crate::datasource::catalog::TableCatalog;
use crate::datasource::traits::RowSource;
use crate::sql::ast::QueryDescriptor;
use crate::sql::error::{SqlError, SqlResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Statement-level execution settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Buffer rows so the cursor can move backwards and jump
    pub scrollable: bool,
    /// Cap on returned rows; 0 is unlimited
    pub max_rows: u64,
    /// Cooperative deadline per execution
    pub query_timeout: Option<Duration>,
}

impl ExecutionConfig {
    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }
}

/// Prepares and runs queries over a catalog.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: ExecutionConfig,
    catalog: Arc<TableCatalog>,
    functions: Arc<FunctionRegistry>,
}

impl QueryEngine {
    pub fn new(catalog: TableCatalog) -> Self {
        Self {
            config: ExecutionConfig::default(),
            catalog: Arc::new(catalog),
            functions: Arc::new(FunctionRegistry::new()),
        }
    }

    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Make user functions available to queries.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Plan and validate `query` against the current table definition.
    pub fn prepare(&self, query: &QueryDescriptor) -> SqlResult<PreparedQuery> {
        let source = open_source(&self.catalog, query.from.as_ref())?;
        self.prepare_with_source(query, source)
    }

    /// Prepare over an already open source, which serves the first execution.
    pub fn prepare_with_source(
        &self,
        query: &QueryDescriptor,
        source: Box<dyn RowSource>,
    ) -> SqlResult<PreparedQuery> {
        let (plan, layout) = self.plan(query, source.as_ref())?;
        let statement = StatementContext::new(source.converter(), self.functions.clone());
        let columns = describe_columns(&plan, &layout, &source.column_types(), &statement);
        log::debug!(
            "Prepared query over {} with columns {:?}",
            query.from.as_ref().map_or("<no table>", |t| t.name.as_str()),
            plan.column_names()
        );
        Ok(PreparedQuery {
            engine: self.clone(),
            query: query.clone(),
            plan: Arc::new(plan),
            layout,
            source_columns: source.columns().to_vec(),
            columns: Arc::new(columns),
            parameters: vec![None; query.placeholder_count],
            pending: Some(source),
        })
    }

    /// Prepare and execute a query without placeholders.
    pub fn execute(&self, query: &QueryDescriptor) -> SqlResult<ResultCursor> {
        self.prepare(query)?.execute()
    }

    fn plan(&self, query: &QueryDescriptor, source: &dyn RowSource) -> SqlResult<(QueryPlan, RowLayout)> {
        let (scope, layout) = table_scope(source, query.from.as_ref(), Vec::new());
        let plan = SelectProcessor::plan(query, &scope, &self.functions)?;
        CatalogSubqueryExecutor::new(self.catalog.clone(), self.functions.clone())
            .validate_nested(query, &scope)?;
        Ok((plan, layout))
    }
}

/// A planned query with its placeholder bindings.
pub struct PreparedQuery {
    engine: QueryEngine,
    query: QueryDescriptor,
    plan: Arc<QueryPlan>,
    layout: RowLayout,
    source_columns: Vec<String>,
    columns: Arc<Vec<ResultColumn>>,
    /// Outer `None` is "not set", inner `None` is SQL NULL
    parameters: Vec<Option<Option<FieldValue>>>,
    pending: Option<Box<dyn RowSource>>,
}

impl PreparedQuery {
    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Bind placeholder `index` (one-based). `None` binds NULL.
    pub fn set_parameter(&mut self, index: usize, value: Option<FieldValue>) -> SqlResult<()> {
        let count = self.parameters.len();
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.parameters.get_mut(i))
            .ok_or_else(|| {
                SqlError::usage_error(format!(
                    "Parameter index {} is out of range; the statement has {} placeholders",
                    index, count
                ))
            })?;
        *slot = Some(value);
        Ok(())
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.iter_mut().for_each(|p| *p = None);
    }

    /// Run with the current bindings.
    pub fn execute(&mut self) -> SqlResult<ResultCursor> {
        self.execute_with_cancel(CancelHandle::new())
    }

    /// Run with the current bindings, cancellable through `cancel`.
    pub fn execute_with_cancel(&mut self, cancel: CancelHandle) -> SqlResult<ResultCursor> {
        let parameters = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| {
                p.clone().ok_or_else(|| {
                    SqlError::usage_error(format!("Parameter {} has not been set", i + 1))
                })
            })
            .collect::<SqlResult<Vec<_>>>()?;

        let source = match self.pending.take() {
            Some(source) => source,
            None => self.reopen()?,
        };

        let engine = &self.engine;
        let statement = StatementContext::new(source.converter(), engine.functions.clone())
            .with_parameters(parameters)
            .with_subqueries(Arc::new(CatalogSubqueryExecutor::new(
                engine.catalog.clone(),
                engine.functions.clone(),
            )));
        let guard = ExecutionGuard::new(engine.config.query_timeout, cancel);
        guard.check()?;

        let pipeline = QueryPipeline::new(
            self.plan.clone(),
            RowStream::new(source, self.layout.clone()),
            ProcessorContext::new(statement, guard),
            engine.config.max_rows,
        );
        Ok(ResultCursor::new(
            pipeline,
            self.columns.clone(),
            engine.config.scrollable,
        ))
    }

    /// Open the table again, re-planning when its columns changed.
    fn reopen(&mut self) -> SqlResult<Box<dyn RowSource>> {
        let source = open_source(&self.engine.catalog, self.query.from.as_ref())?;
        let unchanged = source.columns().len() == self.source_columns.len()
            && source
                .columns()
                .iter()
                .zip(&self.source_columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if !unchanged {
            log::info!("Table columns changed since preparation; planning again");
            let (plan, layout) = self.engine.plan(&self.query, source.as_ref())?;
            self.plan = Arc::new(plan);
            self.layout = layout;
            self.source_columns = source.columns().to_vec();
        }
        Ok(source)
    }
}

impl std::fmt::Debug for PreparedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedQuery")
            .field("plan", &self.plan)
            .field("columns", &self.columns)
            .field("parameters", &self.parameters)
            .finish()
    }
}
