/*!
# Result Cursor

The positioned view over one execution's rows.

```text
BeforeFirst -> Positioned(k) -> AfterLast
      \              |              /
       `---------> Closed <--------'
```

A forward-only cursor only moves with [`ResultCursor::next`] and holds just
the current row. A scrollable cursor buffers every row it has pulled so far
and fills the buffer lazily up to the requested position. Positions are
one-based; position 0 is before the first row and `len + 1` is after the
last one.
*/

use super::environment::{EvalContext, RowLayout, StatementContext};
use super::expression::ExpressionEvaluator;
use super::processors::{CancelHandle, ExecutionGuard, QueryPipeline, QueryPlan, ResultRow};
use super::types::{DataType, FieldValue, ResultColumn};
use crate::sql::ast::SelectExpr;
use crate::sql::error::{SqlError, SqlResult};
use std::sync::Arc;

/// Output column types, found by evaluating each select-list entry once
/// against a row of representative values. Entries that fail or yield NULL
/// are reported as VARCHAR.
pub fn describe_columns(
    plan: &QueryPlan,
    layout: &RowLayout,
    column_types: &[DataType],
    statement: &StatementContext,
) -> Vec<ResultColumn> {
    let env = layout.bind(
        column_types
            .iter()
            .map(|t| Some(t.default_value()))
            .collect(),
    );
    let group = std::slice::from_ref(&env);
    let aggregating = !plan.aggregates.is_empty();
    plan.columns
        .iter()
        .map(|column| {
            let data_type = match &column.expr {
                SelectExpr::Condition(_) => DataType::Boolean,
                expr => {
                    let mut ctx = EvalContext::new(&env, statement);
                    if aggregating {
                        ctx = ctx.with_group(group);
                    }
                    match ExpressionEvaluator::evaluate_select_expr(expr, &ctx) {
                        Ok(Some(value)) => value.data_type(),
                        _ => DataType::String,
                    }
                }
            };
            ResultColumn::new(column.name.clone(), data_type)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    Positioned(usize),
    AfterLast,
    Closed,
}

/// Cursor over the rows of one query execution.
#[derive(Debug)]
pub struct ResultCursor {
    pipeline: QueryPipeline,
    columns: Arc<Vec<ResultColumn>>,
    guard: ExecutionGuard,
    scrollable: bool,
    state: CursorState,
    /// Forward-only: the current row
    current: Option<ResultRow>,
    /// Scrollable: every row pulled so far
    buffer: Vec<ResultRow>,
    exhausted: bool,
}

impl ResultCursor {
    pub fn new(pipeline: QueryPipeline, columns: Arc<Vec<ResultColumn>>, scrollable: bool) -> Self {
        let guard = pipeline.guard().clone();
        Self {
            pipeline,
            columns,
            guard,
            scrollable,
            state: CursorState::BeforeFirst,
            current: None,
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_scrollable(&self) -> bool {
        self.scrollable
    }

    /// Handle that cancels this execution from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.guard.cancel_handle().clone()
    }

    /// Advance to the next row. Returns false once the rows are exhausted.
    pub fn next(&mut self) -> SqlResult<bool> {
        self.begin_operation()?;
        if self.scrollable {
            let target = self.position() + 1;
            return self.move_to(target as i64);
        }
        if self.state == CursorState::AfterLast {
            return Ok(false);
        }
        match self.pipeline.next_row()? {
            Some(row) => {
                let position = match self.state {
                    CursorState::Positioned(k) => k + 1,
                    _ => 1,
                };
                self.current = Some(row);
                self.state = CursorState::Positioned(position);
                Ok(true)
            }
            None => {
                self.current = None;
                self.state = CursorState::AfterLast;
                Ok(false)
            }
        }
    }

    pub fn previous(&mut self) -> SqlResult<bool> {
        self.begin_scroll("previous")?;
        let target = (self.position() as i64).saturating_sub(1);
        self.move_to(target)
    }

    pub fn first(&mut self) -> SqlResult<bool> {
        self.begin_scroll("first")?;
        self.move_to(1)
    }

    pub fn last(&mut self) -> SqlResult<bool> {
        self.begin_scroll("last")?;
        self.fill(None)?;
        let len = self.buffer.len() as i64;
        self.move_to(len)
    }

    /// Move to row `row`. Negative values count back from the end, so -1 is
    /// the last row; 0 moves before the first row.
    pub fn absolute(&mut self, row: i64) -> SqlResult<bool> {
        self.begin_scroll("absolute")?;
        if row >= 0 {
            return self.move_to(row);
        }
        self.fill(None)?;
        let target = (self.buffer.len() as i64 + 1).saturating_add(row);
        self.move_to(target.max(0))
    }

    pub fn relative(&mut self, rows: i64) -> SqlResult<bool> {
        self.begin_scroll("relative")?;
        // past either end lands after the last or before the first row
        let target = (self.position() as i64).saturating_add(rows);
        self.move_to(target)
    }

    /// One-based number of the current row, 0 when not on a row
    pub fn row_number(&self) -> usize {
        match self.state {
            CursorState::Positioned(k) => k,
            _ => 0,
        }
    }

    pub fn is_before_first(&self) -> bool {
        self.state == CursorState::BeforeFirst
    }

    pub fn is_after_last(&self) -> bool {
        self.state == CursorState::AfterLast
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Values of the current row
    pub fn current_row(&self) -> SqlResult<&ResultRow> {
        self.guard.check()?;
        match self.state {
            CursorState::Positioned(k) => {
                let row = if self.scrollable {
                    self.buffer.get(k - 1)
                } else {
                    self.current.as_ref()
                };
                row.ok_or_else(|| SqlError::usage_error("Cursor has no current row"))
            }
            CursorState::BeforeFirst => Err(SqlError::usage_error(
                "Cursor is before the first row; call next() first",
            )),
            CursorState::AfterLast => Err(SqlError::usage_error("Cursor is after the last row")),
            CursorState::Closed => Err(SqlError::usage_error("Cursor is closed")),
        }
    }

    /// Value of column `index` (zero-based) in the current row
    pub fn get(&self, index: usize) -> SqlResult<Option<FieldValue>> {
        let row = self.current_row()?;
        row.get(index).cloned().ok_or_else(|| {
            SqlError::usage_error(format!(
                "Column index {} is out of range for {} columns",
                index,
                row.len()
            ))
        })
    }

    /// Value of the named output column in the current row
    pub fn get_by_name(&self, name: &str) -> SqlResult<Option<FieldValue>> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SqlError::unknown_column(name))?;
        self.get(index)
    }

    /// Read every remaining row.
    pub fn fetch_all(&mut self) -> SqlResult<Vec<ResultRow>> {
        let mut rows = Vec::new();
        while self.next()? {
            rows.push(self.current_row()?.clone());
        }
        Ok(rows)
    }

    /// Release the source. Closing twice is harmless.
    pub fn close(&mut self) {
        if self.state != CursorState::Closed {
            self.pipeline.close();
            self.buffer.clear();
            self.current = None;
            self.state = CursorState::Closed;
        }
    }

    fn begin_operation(&self) -> SqlResult<()> {
        if self.state == CursorState::Closed {
            return Err(SqlError::usage_error("Cursor is closed"));
        }
        self.guard.check()
    }

    fn begin_scroll(&self, operation: &str) -> SqlResult<()> {
        self.begin_operation()?;
        if !self.scrollable {
            return Err(SqlError::usage_error(format!(
                "{}() requires a scrollable cursor",
                operation
            )));
        }
        Ok(())
    }

    /// Current position with after-last taken as `len + 1`
    fn position(&self) -> usize {
        match self.state {
            CursorState::Positioned(k) => k,
            CursorState::AfterLast => self.buffer.len() + 1,
            CursorState::BeforeFirst | CursorState::Closed => 0,
        }
    }

    /// Pull rows into the buffer until it holds `upto` rows, or all of them.
    fn fill(&mut self, upto: Option<usize>) -> SqlResult<()> {
        while !self.exhausted && upto.map_or(true, |n| self.buffer.len() < n) {
            match self.pipeline.next_row()? {
                Some(row) => self.buffer.push(row),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    fn move_to(&mut self, target: i64) -> SqlResult<bool> {
        if target <= 0 {
            self.state = CursorState::BeforeFirst;
            return Ok(false);
        }
        let target = usize::try_from(target).unwrap_or(usize::MAX);
        self.fill(Some(target))?;
        if target <= self.buffer.len() {
            self.state = CursorState::Positioned(target);
            Ok(true)
        } else {
            self.state = CursorState::AfterLast;
            Ok(false)
        }
    }
}

impl Drop for ResultCursor {
    fn drop(&mut self) {
        self.close();
    }
}
