//! OFFSET / LIMIT row window

/// Tracks the row window of one execution. `max_rows` from the statement
/// configuration caps LIMIT when it is non-zero.
#[derive(Debug, Clone)]
pub struct LimitProcessor {
    offset: u64,
    limit: Option<u64>,
    skipped: u64,
    emitted: u64,
}

impl LimitProcessor {
    pub fn new(offset: u64, limit: Option<u64>, max_rows: u64) -> Self {
        let limit = match (limit, max_rows) {
            (limit, 0) => limit,
            (Some(limit), max) => Some(limit.min(max)),
            (None, max) => Some(max),
        };
        Self {
            offset,
            limit,
            skipped: 0,
            emitted: 0,
        }
    }

    /// Offer the next produced row: true when it belongs to the window.
    pub fn admit(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        if self.skipped < self.offset {
            self.skipped += 1;
            return false;
        }
        self.emitted += 1;
        true
    }

    /// No further row can be admitted
    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.emitted >= limit)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}
