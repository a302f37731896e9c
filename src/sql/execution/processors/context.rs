//! Processor execution context and state management

use crate::datasource::traits::RowSource;
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::environment::{RowEnvironment, RowLayout, StatementContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancels a running query from another thread. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The query fails at its next checked boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Cooperative deadline and cancellation checks.
///
/// Checked at the start of every cursor operation and before every row is
/// pulled from the source; long-running work between checks is not
/// interrupted.
#[derive(Debug, Clone)]
pub struct ExecutionGuard {
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    cancel: CancelHandle,
}

impl ExecutionGuard {
    /// Start the clock now
    pub fn new(timeout: Option<Duration>, cancel: CancelHandle) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            timeout,
            cancel,
        }
    }

    /// A guard that never fires
    pub fn unbounded() -> Self {
        Self::new(None, CancelHandle::new())
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    pub fn check(&self) -> SqlResult<()> {
        if self.cancel.is_cancelled() {
            log::info!("Query cancelled by caller");
            return Err(SqlError::Cancelled);
        }
        if let (Some(deadline), Some(timeout)) = (self.deadline, self.timeout) {
            if Instant::now() >= deadline {
                log::warn!("Query exceeded its timeout of {:?}", timeout);
                return Err(SqlError::Timeout {
                    timeout_ms: timeout.as_millis(),
                });
            }
        }
        Ok(())
    }
}

/// An open source together with the layout that turns its rows into
/// environments.
pub struct RowStream {
    source: Box<dyn RowSource>,
    layout: RowLayout,
    closed: bool,
}

impl RowStream {
    pub fn new(source: Box<dyn RowSource>, layout: RowLayout) -> Self {
        Self {
            source,
            layout,
            closed: false,
        }
    }

    /// Pull the next row, checking the guard first.
    pub fn next_env(&mut self, guard: &ExecutionGuard) -> SqlResult<Option<RowEnvironment>> {
        if self.closed {
            return Ok(None);
        }
        guard.check()?;
        match self.source.next_row()? {
            Some(values) => Ok(Some(self.layout.bind(values))),
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.source.close();
            self.closed = true;
        }
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Per-execution state shared by the processors.
pub struct ProcessorContext {
    pub statement: StatementContext,
    pub guard: ExecutionGuard,
}

impl ProcessorContext {
    pub fn new(statement: StatementContext, guard: ExecutionGuard) -> Self {
        Self { statement, guard }
    }
}
