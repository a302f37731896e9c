//! SELECT Query Planning
//!
//! Turns a [`QueryDescriptor`] into a [`QueryPlan`] once per preparation:
//!
//! 1. `*` and `alias.*` are expanded to one output column per physical column
//! 2. ordinals and output aliases in GROUP BY, HAVING and ORDER BY are
//!    resolved to select-list expressions
//! 3. the query is validated against the table's columns and the function
//!    registry, and aggregate usage is checked
//! 4. an execution strategy is chosen from the shape of the query
//!
//! Every error raised here is a validation error: nothing has been read yet.

use crate::sql::ast::{
    AggregateCall, Condition, Expr, OrderDirection, QueryDescriptor, SelectExpr, SelectItem,
    TableReference,
};
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::expression::function_registry::FunctionRegistry;
use crate::sql::execution::validation::{AggregationValidator, FieldValidator};

/// One output column of a plan
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub name: String,
    pub expr: SelectExpr,
}

/// How rows flow from the source to the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Rows stream through WHERE, DISTINCT and the row window one at a time
    Plain,
    /// The filtered input is grouped, then each group becomes one row
    Grouped,
    /// The filtered input feeds streaming accumulators producing one row
    WholeTableAggregate,
    /// The filtered input is materialized and sorted
    Sorted,
}

/// One resolved ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: SelectExpr,
    pub direction: OrderDirection,
}

/// Column names a query may reference.
#[derive(Debug, Clone, Default)]
pub struct TableScope {
    /// Physical column names in table order
    pub columns: Vec<String>,
    /// Every name a column may be referenced by, qualified forms included
    pub available: Vec<String>,
    /// False when the table's columns are not known up front
    pub static_columns: bool,
    /// Names visible from the enclosing row of a correlated sub-query
    pub outer: Vec<String>,
}

impl TableScope {
    fn is_column(&self, name: &str) -> bool {
        self.available.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    fn is_visible(&self, name: &str) -> bool {
        self.is_column(name) || self.outer.iter().any(|o| o.eq_ignore_ascii_case(name))
    }
}

/// A validated, executable query.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub table: Option<TableReference>,
    pub columns: Vec<OutputColumn>,
    pub distinct: bool,
    pub where_clause: Option<Condition>,
    pub group_by: Vec<SelectExpr>,
    pub having: Option<Condition>,
    pub order_by: Vec<SortKey>,
    /// Distinct aggregate call-sites of select list, HAVING and ORDER BY
    pub aggregates: Vec<AggregateCall>,
    pub strategy: ExecutionStrategy,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl QueryPlan {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Planner for SELECT statements
pub struct SelectProcessor;

impl SelectProcessor {
    /// Build and validate the plan for `query` over a table with `scope`.
    pub fn plan(
        query: &QueryDescriptor,
        scope: &TableScope,
        functions: &FunctionRegistry,
    ) -> SqlResult<QueryPlan> {
        let columns = Self::expand_select(query, scope)?;

        let group_by = query
            .group_by
            .iter()
            .map(|e| Self::resolve_reference(e, &columns, scope, "GROUP BY"))
            .collect::<SqlResult<Vec<_>>>()?;
        let order_by = query
            .order_by
            .iter()
            .map(|o| {
                Ok(SortKey {
                    expr: Self::resolve_reference(&o.expr, &columns, scope, "ORDER BY")?,
                    direction: o.direction,
                })
            })
            .collect::<SqlResult<Vec<_>>>()?;
        let having = query
            .having
            .as_ref()
            .map(|h| h.map_columns(&|name| Self::alias_substitute(name, &columns, scope)));
        let mut where_clause = query.where_clause.clone();

        Self::validate_references(
            &columns,
            where_clause.as_ref(),
            &group_by,
            having.as_ref(),
            &order_by,
            scope,
            functions,
        )?;

        if let Some(condition) = &where_clause {
            AggregationValidator::validate_no_aggregates(
                &SelectExpr::Condition(condition.clone()),
                "WHERE",
            )?;
        }
        for expr in &group_by {
            AggregationValidator::validate_no_aggregates(expr, "GROUP BY")?;
        }

        let mut aggregates: Vec<AggregateCall> = Vec::new();
        {
            let mut calls: Vec<&AggregateCall> = Vec::new();
            for column in &columns {
                calls.extend(select_aggregates(&column.expr));
            }
            if let Some(h) = &having {
                calls.extend(h.aggregate_functions());
            }
            for key in &order_by {
                calls.extend(select_aggregates(&key.expr));
            }
            AggregationValidator::validate_not_nested(&calls)?;
            for call in calls {
                if !aggregates.contains(call) {
                    aggregates.push(call.clone());
                }
            }
        }

        let mut having = having;
        if group_by.is_empty() && aggregates.is_empty() {
            if let Some(h) = having.take() {
                log::debug!("HAVING without GROUP BY or aggregates is applied as WHERE");
                where_clause = Some(match where_clause {
                    Some(w) => Condition::and(w, h),
                    None => h,
                });
            }
        }

        if !group_by.is_empty() || !aggregates.is_empty() {
            for column in &columns {
                AggregationValidator::validate_grouped(&column.expr, &group_by, "SELECT")?;
            }
            if let Some(h) = &having {
                AggregationValidator::validate_grouped(
                    &SelectExpr::Condition(h.clone()),
                    &group_by,
                    "HAVING",
                )?;
            }
            for key in &order_by {
                AggregationValidator::validate_grouped(&key.expr, &group_by, "ORDER BY")?;
            }
        }

        let mut distinct = query.distinct;
        let mut group_by = group_by;
        if !group_by.is_empty()
            && aggregates.is_empty()
            && having.is_none()
            && columns.iter().all(|c| group_by.contains(&c.expr))
            && group_by.iter().all(|g| columns.iter().any(|c| &c.expr == g))
        {
            log::debug!("GROUP BY without aggregates executes as SELECT DISTINCT");
            distinct = true;
            group_by.clear();
        }

        let strategy = if !group_by.is_empty() {
            ExecutionStrategy::Grouped
        } else if !aggregates.is_empty() {
            ExecutionStrategy::WholeTableAggregate
        } else if !order_by.is_empty() {
            ExecutionStrategy::Sorted
        } else {
            ExecutionStrategy::Plain
        };
        log::debug!(
            "Planned {:?} execution with {} output columns and {} aggregates",
            strategy,
            columns.len(),
            aggregates.len()
        );

        Ok(QueryPlan {
            table: query.from.clone(),
            columns,
            distinct,
            where_clause,
            group_by,
            having,
            order_by,
            aggregates,
            strategy,
            offset: query.offset,
            limit: query.limit,
        })
    }

    fn expand_select(query: &QueryDescriptor, scope: &TableScope) -> SqlResult<Vec<OutputColumn>> {
        let mut columns = Vec::new();
        for item in &query.select {
            match item {
                SelectItem::Wildcard => {
                    if query.from.is_none() {
                        return Err(SqlError::validation_error(
                            "SELECT * requires a FROM clause",
                            None,
                        ));
                    }
                    for column in &scope.columns {
                        columns.push(OutputColumn {
                            name: column.clone(),
                            expr: SelectExpr::Value(Expr::Column(column.clone())),
                        });
                    }
                }
                SelectItem::QualifiedWildcard(qualifier) => {
                    let known = query.from.as_ref().is_some_and(|t| {
                        t.name.eq_ignore_ascii_case(qualifier)
                            || t.alias
                                .as_ref()
                                .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
                    });
                    if !known {
                        return Err(SqlError::validation_error(
                            "Unknown table qualifier",
                            Some(qualifier.clone()),
                        ));
                    }
                    for column in &scope.columns {
                        columns.push(OutputColumn {
                            name: column.clone(),
                            expr: SelectExpr::Value(Expr::Column(format!(
                                "{}.{}",
                                qualifier, column
                            ))),
                        });
                    }
                }
                SelectItem::Expression { expr, alias } => columns.push(OutputColumn {
                    name: alias.clone().unwrap_or_else(|| default_name(expr)),
                    expr: expr.clone(),
                }),
            }
        }
        if columns.is_empty() {
            return Err(SqlError::validation_error("Select list is empty", None));
        }
        Ok(columns)
    }

    /// Resolve a GROUP BY or ORDER BY entry: an integer literal is a
    /// one-based position in the select list, a bare name that is not a
    /// table column may be an output alias.
    fn resolve_reference(
        expr: &Expr,
        columns: &[OutputColumn],
        scope: &TableScope,
        clause: &str,
    ) -> SqlResult<SelectExpr> {
        if let Expr::Literal(Some(value)) = expr {
            if let Some(position) = value.as_i64() {
                if position < 1 || position as usize > columns.len() {
                    return Err(SqlError::validation_error(
                        format!("{} position {} is not in the select list", clause, position),
                        None,
                    ));
                }
                return Ok(columns[position as usize - 1].expr.clone());
            }
        }
        if let Expr::Column(name) = expr {
            if !scope.is_visible(name) {
                let mut matches = columns.iter().filter(|c| c.name.eq_ignore_ascii_case(name));
                if let Some(column) = matches.next() {
                    if matches.any(|other| other.expr != column.expr) {
                        return Err(SqlError::validation_error(
                            format!("Ambiguous reference in {}", clause),
                            Some(name.clone()),
                        ));
                    }
                    return Ok(column.expr.clone());
                }
            }
        }
        Ok(SelectExpr::Value(expr.map_columns(&|name| {
            Self::alias_substitute(name, columns, scope)
        })))
    }

    /// Value expression an output alias stands for, when `name` is not a
    /// column of its own
    fn alias_substitute(name: &str, columns: &[OutputColumn], scope: &TableScope) -> Option<Expr> {
        if scope.is_visible(name) {
            return None;
        }
        columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .and_then(|c| match &c.expr {
                SelectExpr::Value(e) => Some(e.clone()),
                SelectExpr::Condition(_) => None,
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_references(
        columns: &[OutputColumn],
        where_clause: Option<&Condition>,
        group_by: &[SelectExpr],
        having: Option<&Condition>,
        order_by: &[SortKey],
        scope: &TableScope,
        functions: &FunctionRegistry,
    ) -> SqlResult<()> {
        let mut clauses: Vec<(SelectExpr, &str)> = Vec::new();
        clauses.extend(columns.iter().map(|c| (c.expr.clone(), "SELECT")));
        clauses.extend(where_clause.map(|w| (SelectExpr::Condition(w.clone()), "WHERE")));
        clauses.extend(group_by.iter().map(|g| (g.clone(), "GROUP BY")));
        clauses.extend(having.map(|h| (SelectExpr::Condition(h.clone()), "HAVING")));
        clauses.extend(order_by.iter().map(|k| (k.expr.clone(), "ORDER BY")));

        let visible: Vec<String> = scope.available.iter().chain(&scope.outer).cloned().collect();
        for (expr, clause) in &clauses {
            if scope.static_columns {
                FieldValidator::validate_columns(expr, &visible, clause)?;
            }
            FieldValidator::validate_functions(expr, functions)?;
        }
        Ok(())
    }
}

fn select_aggregates(expr: &SelectExpr) -> Vec<&AggregateCall> {
    match expr {
        SelectExpr::Value(e) => e.aggregate_functions(),
        SelectExpr::Condition(c) => c.aggregate_functions(),
    }
}

/// Output name of an unaliased select item
fn default_name(expr: &SelectExpr) -> String {
    match expr {
        SelectExpr::Value(Expr::Column(name)) => {
            name.rsplit('.').next().unwrap_or(name).to_string()
        }
        other => other.to_string(),
    }
}
