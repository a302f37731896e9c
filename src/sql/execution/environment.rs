/*!
# Row Environments and Evaluation Context

A [`RowEnvironment`] maps upper-case column keys to values for one row. Each
physical column is reachable as `COL`, `TABLE.COL` and, when the table has an
alias, `ALIAS.COL`. Rows are small, so the environment is a flat vector of
pairs searched linearly instead of a hash map.

Everything else an expression may need (the grouped member rows, computed
aggregate values, the converter, parameters, the random generator, the
enclosing row of a correlated sub-query) travels in [`EvalContext`] and
[`StatementContext`] instead of sharing the column namespace.
*/

use crate::sql::ast::TableReference;
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::aggregation::AggregateValues;
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::expression::function_registry::FunctionRegistry;
use crate::sql::execution::expression::subquery_executor::SubqueryExecutor;
use crate::sql::execution::types::FieldValue;
use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::sync::Arc;

/// Column values of one physical or synthetic row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowEnvironment {
    entries: Vec<(Arc<str>, Option<FieldValue>)>,
}

impl RowEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace a value. Keys are stored as given; callers pass
    /// upper-case keys.
    pub fn insert(&mut self, key: Arc<str>, value: Option<FieldValue>) {
        match self.entries.iter_mut().find(|(k, _)| **k == *key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up a column. The outer `Option` is "column present", the inner
    /// one is the SQL value.
    pub fn lookup(&self, name: &str) -> Option<Option<&FieldValue>> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Precomputed keys for turning raw column values into row environments.
#[derive(Debug, Clone)]
pub struct RowLayout {
    columns: Vec<Arc<str>>,
    keys: Vec<Vec<Arc<str>>>,
}

impl RowLayout {
    pub fn new(columns: &[String], table: Option<&TableReference>) -> Self {
        let mut prefixes: Vec<String> = Vec::new();
        if let Some(table) = table {
            prefixes.push(table.name.to_uppercase());
            if let Some(alias) = &table.alias {
                let alias = alias.to_uppercase();
                if !prefixes.contains(&alias) {
                    prefixes.push(alias);
                }
            }
        }

        let columns: Vec<Arc<str>> = columns
            .iter()
            .map(|c| Arc::from(c.to_uppercase().as_str()))
            .collect();
        let keys = columns
            .iter()
            .map(|col| {
                let mut keys = vec![col.clone()];
                for prefix in &prefixes {
                    keys.push(Arc::from(format!("{}.{}", prefix, col).as_str()));
                }
                keys
            })
            .collect();
        Self { columns, keys }
    }

    /// Upper-case physical column names in table order
    pub fn columns(&self) -> &[Arc<str>] {
        &self.columns
    }

    /// Every key a column can be referenced by, qualified forms included
    pub fn available_names(&self) -> Vec<String> {
        self.keys
            .iter()
            .flat_map(|keys| keys.iter().map(|k| k.to_string()))
            .collect()
    }

    /// Build the environment for one row. Missing trailing values are NULL.
    pub fn bind(&self, values: Vec<Option<FieldValue>>) -> RowEnvironment {
        let mut env = RowEnvironment::with_capacity(self.keys.iter().map(Vec::len).sum());
        let mut values = values.into_iter();
        for keys in &self.keys {
            let value = values.next().flatten();
            for key in keys {
                env.entries.push((key.clone(), value.clone()));
            }
        }
        env
    }
}

/// Per-statement state shared by every row evaluated for one execution.
pub struct StatementContext {
    pub converter: Arc<TypeConverter>,
    pub functions: Arc<FunctionRegistry>,
    /// Bound placeholder values, indexed from zero
    pub parameters: Vec<Option<FieldValue>>,
    /// Executes nested queries; `None` when the statement has no catalog
    pub subqueries: Option<Arc<dyn SubqueryExecutor>>,
    /// Enclosing row when this statement runs as a correlated sub-query
    pub outer_row: Option<RowEnvironment>,
    /// Fixed for the statement so CURRENT_* functions agree across rows
    pub now: NaiveDateTime,
    random: RefCell<StdRng>,
}

impl StatementContext {
    pub fn new(converter: Arc<TypeConverter>, functions: Arc<FunctionRegistry>) -> Self {
        Self {
            converter,
            functions,
            parameters: Vec::new(),
            subqueries: None,
            outer_row: None,
            now: Local::now().naive_local(),
            random: RefCell::new(StdRng::from_entropy()),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Option<FieldValue>>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_subqueries(mut self, executor: Arc<dyn SubqueryExecutor>) -> Self {
        self.subqueries = Some(executor);
        self
    }

    /// Use a seeded generator, for reproducible RANDOM() output
    pub fn with_seed(self, seed: u64) -> Self {
        self.random.replace(StdRng::seed_from_u64(seed));
        self
    }

    /// Context for a nested query correlated with `outer_row`.
    pub fn for_subquery(&self, outer_row: &RowEnvironment) -> Self {
        let mut outer = outer_row.clone();
        // references two levels out stay visible
        if let Some(parent) = &self.outer_row {
            for (key, value) in &parent.entries {
                if !outer.contains(key) {
                    outer.entries.push((key.clone(), value.clone()));
                }
            }
        }
        let random = StdRng::from_rng(&mut *self.random.borrow_mut())
            .unwrap_or_else(|_| StdRng::from_entropy());
        Self {
            converter: self.converter.clone(),
            functions: self.functions.clone(),
            parameters: self.parameters.clone(),
            subqueries: self.subqueries.clone(),
            outer_row: Some(outer),
            now: self.now,
            random: RefCell::new(random),
        }
    }

    /// Uniform value in `[0, 1)`
    pub fn next_random(&self) -> f64 {
        use rand::Rng;
        self.random.borrow_mut().gen::<f64>()
    }

    pub fn parameter(&self, index: usize) -> SqlResult<Option<FieldValue>> {
        if index == 0 || index > self.parameters.len() {
            return Err(SqlError::usage_error(format!(
                "Parameter {} has not been set",
                index
            )));
        }
        Ok(self.parameters[index - 1].clone())
    }
}

impl std::fmt::Debug for StatementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementContext")
            .field("converter", &self.converter)
            .field("parameters", &self.parameters)
            .field("outer_row", &self.outer_row)
            .field("now", &self.now)
            .finish()
    }
}

/// Everything one expression evaluation can see.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// The current row, or the representative row of a group
    pub row: &'a RowEnvironment,
    /// Member rows when evaluating a GROUP BY result row
    pub group: Option<&'a [RowEnvironment]>,
    /// Streaming aggregate results for a whole-table aggregate row
    pub aggregates: Option<&'a AggregateValues>,
    pub statement: &'a StatementContext,
}

impl<'a> EvalContext<'a> {
    pub fn new(row: &'a RowEnvironment, statement: &'a StatementContext) -> Self {
        Self {
            row,
            group: None,
            aggregates: None,
            statement,
        }
    }

    pub fn with_group(mut self, rows: &'a [RowEnvironment]) -> Self {
        self.group = Some(rows);
        self
    }

    pub fn with_aggregates(mut self, values: &'a AggregateValues) -> Self {
        self.aggregates = Some(values);
        self
    }

    /// Context for one member row of the current group.
    pub fn member<'b>(&self, row: &'b RowEnvironment) -> EvalContext<'b>
    where
        'a: 'b,
    {
        EvalContext::new(row, self.statement)
    }

    /// Resolve a column against the row, then against the enclosing row of a
    /// correlated sub-query.
    pub fn column(&self, name: &str) -> SqlResult<Option<FieldValue>> {
        if let Some(value) = self.row.lookup(name) {
            return Ok(value.cloned());
        }
        if let Some(value) = self.statement.outer_row.as_ref().and_then(|o| o.lookup(name)) {
            return Ok(value.cloned());
        }
        Err(SqlError::unknown_column(name))
    }
}
