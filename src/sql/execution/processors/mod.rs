//! Processors for SQL query execution
//!
//! This module contains specialized processors for the stages of a SELECT:
//! - SELECT planning and validation ([`SelectProcessor`])
//! - GROUP BY partitioning ([`GroupByProcessor`])
//! - ORDER BY sorting ([`OrderProcessor`])
//! - OFFSET / LIMIT windowing ([`LimitProcessor`])
//! - nested query execution ([`CatalogSubqueryExecutor`])
//!
//! [`QueryPipeline`] drives them for one execution. Plain queries stream one
//! source row at a time; grouped, aggregated and sorted queries read their
//! whole filtered input on the first pull.

pub mod context;
pub mod group_by;
pub mod limit;
pub mod order;
pub mod select;
pub mod subquery;

pub use context::{CancelHandle, ExecutionGuard, ProcessorContext, RowStream};
pub use group_by::{Group, GroupByProcessor};
pub use limit::LimitProcessor;
pub use order::OrderProcessor;
pub use select::{ExecutionStrategy, OutputColumn, QueryPlan, SelectProcessor, SortKey, TableScope};
pub use subquery::CatalogSubqueryExecutor;

use crate::datasource::catalog::TableCatalog;
use crate::datasource::memory::MemoryTable;
use crate::datasource::traits::RowSource;
use crate::sql::ast::TableReference;
use crate::sql::error::SqlResult;
use crate::sql::execution::aggregation::AccumulatorManager;
use crate::sql::execution::environment::{EvalContext, RowEnvironment, RowLayout};
use crate::sql::execution::expression::ExpressionEvaluator;
use crate::sql::execution::types::FieldValue;
use std::collections::HashSet;
use std::sync::Arc;

/// One output row, in select-list order
pub type ResultRow = Vec<Option<FieldValue>>;

/// Open the table named in FROM, or a single empty row when there is none.
pub fn open_source(catalog: &TableCatalog, table: Option<&TableReference>) -> SqlResult<Box<dyn RowSource>> {
    match table {
        Some(table) => catalog.open(&table.name),
        None => Ok(Box::new(
            MemoryTable::new(Vec::new(), Vec::new())?
                .with_rows(vec![Vec::new()])?
                .source(),
        )),
    }
}

/// Names the query may reference and the layout that binds source rows.
pub fn table_scope(
    source: &dyn RowSource,
    table: Option<&TableReference>,
    outer: Vec<String>,
) -> (TableScope, RowLayout) {
    let layout = RowLayout::new(source.columns(), table);
    let scope = TableScope {
        columns: source.columns().to_vec(),
        available: layout.available_names(),
        static_columns: source.has_static_columns(),
        outer,
    };
    (scope, layout)
}

/// Executes one plan over one open source.
pub struct QueryPipeline {
    plan: Arc<QueryPlan>,
    input: Option<RowStream>,
    context: ProcessorContext,
    window: LimitProcessor,
    distinct_seen: HashSet<ResultRow>,
    materialized: Option<std::vec::IntoIter<ResultRow>>,
    closed: bool,
}

impl QueryPipeline {
    pub fn new(plan: Arc<QueryPlan>, input: RowStream, context: ProcessorContext, max_rows: u64) -> Self {
        let window = LimitProcessor::new(plan.offset, plan.limit, max_rows);
        Self {
            plan,
            input: Some(input),
            context,
            window,
            distinct_seen: HashSet::new(),
            materialized: None,
            closed: false,
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.context.guard
    }

    /// Next row inside the OFFSET / LIMIT window.
    pub fn next_row(&mut self) -> SqlResult<Option<ResultRow>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            if self.window.is_exhausted() {
                self.close();
                return Ok(None);
            }
            let candidate = match self.plan.strategy {
                ExecutionStrategy::Plain => self.next_plain()?,
                _ => {
                    if self.materialized.is_none() {
                        let rows = self.materialize()?;
                        self.materialized = Some(rows.into_iter());
                    }
                    self.materialized.as_mut().and_then(Iterator::next)
                }
            };
            match candidate {
                Some(row) if self.window.admit() => return Ok(Some(row)),
                Some(_) => continue,
                None => {
                    self.close();
                    return Ok(None);
                }
            }
        }
    }

    /// Stop reading and release the source.
    pub fn close(&mut self) {
        if !self.closed {
            if let Some(mut input) = self.input.take() {
                input.close();
            }
            self.materialized = None;
            self.closed = true;
        }
    }

    fn next_filtered(&mut self) -> SqlResult<Option<RowEnvironment>> {
        while let Some(input) = self.input.as_mut() {
            let Some(env) = input.next_env(&self.context.guard)? else {
                return Ok(None);
            };
            let keep = match &self.plan.where_clause {
                Some(condition) => ExpressionEvaluator::is_satisfied(
                    condition,
                    &EvalContext::new(&env, &self.context.statement),
                )?,
                None => true,
            };
            if keep {
                return Ok(Some(env));
            }
        }
        Ok(None)
    }

    fn next_plain(&mut self) -> SqlResult<Option<ResultRow>> {
        while let Some(env) = self.next_filtered()? {
            let row = project(&self.plan, &EvalContext::new(&env, &self.context.statement))?;
            if first_seen(&mut self.distinct_seen, self.plan.distinct, &row) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn materialize(&mut self) -> SqlResult<Vec<ResultRow>> {
        let plan = self.plan.clone();
        let mut keyed: Vec<(ResultRow, Vec<Option<FieldValue>>)> = Vec::new();
        match plan.strategy {
            ExecutionStrategy::Plain => {}
            ExecutionStrategy::Sorted => {
                while let Some(env) = self.next_filtered()? {
                    let ctx = EvalContext::new(&env, &self.context.statement);
                    let row = project(&plan, &ctx)?;
                    let keys = OrderProcessor::sort_keys(&plan.order_by, &ctx)?;
                    if first_seen(&mut self.distinct_seen, plan.distinct, &row) {
                        keyed.push((row, keys));
                    }
                }
            }
            ExecutionStrategy::Grouped => {
                let mut groups = GroupByProcessor::new();
                while let Some(env) = self.next_filtered()? {
                    groups.add_row(&plan.group_by, env, &self.context.statement)?;
                }
                for group in groups.into_groups() {
                    self.context.guard.check()?;
                    let Some(representative) = group.rows.first() else {
                        continue;
                    };
                    let ctx = EvalContext::new(representative, &self.context.statement)
                        .with_group(&group.rows);
                    if let Some(having) = &plan.having {
                        if !ExpressionEvaluator::is_satisfied(having, &ctx)? {
                            continue;
                        }
                    }
                    let row = project(&plan, &ctx)?;
                    let keys = OrderProcessor::sort_keys(&plan.order_by, &ctx)?;
                    if first_seen(&mut self.distinct_seen, plan.distinct, &row) {
                        keyed.push((row, keys));
                    }
                }
            }
            ExecutionStrategy::WholeTableAggregate => {
                let mut accumulators = AccumulatorManager::new(&plan.aggregates);
                let mut first: Option<RowEnvironment> = None;
                while let Some(env) = self.next_filtered()? {
                    accumulators.process_row(&EvalContext::new(&env, &self.context.statement))?;
                    if first.is_none() {
                        first = Some(env);
                    }
                }
                let values = accumulators.values();
                let representative = first.unwrap_or_default();
                let ctx = EvalContext::new(&representative, &self.context.statement)
                    .with_aggregates(&values);
                let passes = match &plan.having {
                    Some(having) => ExpressionEvaluator::is_satisfied(having, &ctx)?,
                    None => true,
                };
                if passes {
                    keyed.push((project(&plan, &ctx)?, Vec::new()));
                }
            }
        }
        log::debug!("Materialized {} rows for {:?} execution", keyed.len(), plan.strategy);
        Ok(OrderProcessor::sort(
            keyed,
            &plan.order_by,
            &self.context.statement.converter,
        ))
    }
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("strategy", &self.plan.strategy)
            .field("window", &self.window)
            .field("closed", &self.closed)
            .finish()
    }
}

fn project(plan: &QueryPlan, ctx: &EvalContext) -> SqlResult<ResultRow> {
    plan.columns
        .iter()
        .map(|column| ExpressionEvaluator::evaluate_select_expr(&column.expr, ctx))
        .collect()
}

fn first_seen(seen: &mut HashSet<ResultRow>, distinct: bool, row: &ResultRow) -> bool {
    !distinct || seen.insert(row.clone())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::{
        AggregateFunction, ComparisonOperator, Condition, Expr, OrderByExpr, QueryDescriptor,
        SelectItem,
    };
    use crate::sql::execution::convert::TypeConverter;
    use crate::sql::execution::environment::StatementContext;
    use crate::sql::execution::expression::FunctionRegistry;

    fn catalog() -> TableCatalog {
        let s = |v: &str| Some(FieldValue::String(v.to_string()));
        let mut catalog = TableCatalog::new();
        catalog.register_memory(
            "emp",
            MemoryTable::with_string_columns(&["name", "dept", "salary"])
                .unwrap()
                .with_rows(vec![
                    vec![s("ann"), s("a"), s("10")],
                    vec![s("bob"), s("b"), s("20")],
                    vec![s("cid"), s("a"), s("30")],
                    vec![s("dan"), None, s("40")],
                ])
                .unwrap(),
        );
        catalog
    }

    fn run(query: &QueryDescriptor) -> Vec<ResultRow> {
        let catalog = catalog();
        let source = open_source(&catalog, query.from.as_ref()).unwrap();
        let (scope, layout) = table_scope(source.as_ref(), query.from.as_ref(), Vec::new());
        let plan = SelectProcessor::plan(query, &scope, &FunctionRegistry::new()).unwrap();
        let statement = StatementContext::new(
            Arc::new(TypeConverter::default()),
            Arc::new(FunctionRegistry::new()),
        );
        let mut pipeline = QueryPipeline::new(
            Arc::new(plan),
            RowStream::new(source, layout),
            ProcessorContext::new(statement, ExecutionGuard::unbounded()),
            0,
        );
        let mut rows = Vec::new();
        while let Some(row) = pipeline.next_row().unwrap() {
            rows.push(row);
        }
        rows
    }

    fn text(rows: &[ResultRow]) -> Vec<Vec<String>> {
        let conv = TypeConverter::default();
        rows.iter()
            .map(|row| row.iter().map(|v| conv.format_opt(v.as_ref())).collect())
            .collect()
    }

    #[test]
    fn test_plain_filter_and_window() {
        let q = QueryDescriptor::new(vec![SelectItem::column("name")])
            .from_table("emp")
            .with_where(Condition::compare(
                Expr::column("salary"),
                ComparisonOperator::GreaterThan,
                Expr::int(10),
            ))
            .offset(1)
            .limit(1);
        assert_eq!(text(&run(&q)), vec![vec!["cid"]]);
    }

    #[test]
    fn test_grouped_with_having_and_order() {
        let q = QueryDescriptor::new(vec![
            SelectItem::column("dept"),
            SelectItem::aliased(Expr::count_star(), "n"),
        ])
        .from_table("emp")
        .group_by(vec![Expr::column("dept")])
        .having(Condition::compare(Expr::count_star(), ComparisonOperator::GreaterThanOrEqual, Expr::int(1)))
        .order_by(vec![OrderByExpr::desc(Expr::column("n"))]);
        let rows = run(&q);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![Some(FieldValue::String("a".into())), Some(FieldValue::Long(2))]);
        // equal counts keep first-seen group order, NULL group included
        assert_eq!(rows[1][0], Some(FieldValue::String("b".into())));
        assert_eq!(rows[2][0], None);
    }

    #[test]
    fn test_whole_table_aggregate_over_empty_input() {
        let q = QueryDescriptor::new(vec![
            SelectItem::expr(Expr::count_star()),
            SelectItem::expr(Expr::aggregate(AggregateFunction::Sum, Expr::column("salary"))),
        ])
        .from_table("emp")
        .with_where(Condition::eq(Expr::column("name"), Expr::string("nobody")));
        assert_eq!(run(&q), vec![vec![Some(FieldValue::Long(0)), None]]);
    }

    #[test]
    fn test_sorted_distinct_and_no_from() {
        let q = QueryDescriptor::new(vec![SelectItem::column("dept")])
            .distinct()
            .from_table("emp")
            .order_by(vec![OrderByExpr::asc(Expr::column("dept"))]);
        assert_eq!(text(&run(&q)), vec![vec!["a"], vec!["b"], vec![""]]);

        let constant = QueryDescriptor::new(vec![SelectItem::expr(Expr::int(7))]);
        assert_eq!(run(&constant), vec![vec![Some(FieldValue::Integer(7))]]);
    }
}
