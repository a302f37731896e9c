//! Aggregate accumulators.
//!
//! One [`AggregateAccumulator`] exists per aggregate call-site. It is used in
//! two ways that must agree:
//!
//! - *streaming*: [`AggregateAccumulator::process_row`] once per source row,
//!   then [`AggregateAccumulator::value`] once, for a whole-table aggregate
//! - *grouped*: [`AggregateAccumulator::evaluate_grouped`] replays a fresh
//!   accumulator over the member rows of one group

use crate::sql::ast::{AggregateCall, AggregateFunction};
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::environment::{EvalContext, RowEnvironment};
use crate::sql::execution::expression::ExpressionEvaluator;
use crate::sql::execution::types::FieldValue;
use crate::sql::execution::utils::field_value_arithmetic::{parse_numeric_text, round_to_precision};
use crate::sql::execution::utils::FieldValueComparator;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Default STRING_AGG delimiter when none is given
pub const DEFAULT_STRING_AGG_DELIMITER: &str = ",";

#[derive(Debug, Clone)]
enum AccumulatorState {
    Count(i64),
    /// Exact running total, switching to f64 once a value has no decimal form
    Sum {
        exact: Decimal,
        approximate: Option<f64>,
        count: u64,
    },
    Extremum(Option<FieldValue>),
    Strings(Vec<String>),
    Values(Vec<FieldValue>),
}

/// Running state of one aggregate call-site
#[derive(Debug, Clone)]
pub struct AggregateAccumulator {
    call: AggregateCall,
    state: AccumulatorState,
    seen: Option<HashSet<FieldValue>>,
}

impl AggregateAccumulator {
    pub fn new(call: &AggregateCall) -> Self {
        Self {
            call: call.clone(),
            state: Self::initial_state(call.function),
            seen: call.distinct.then(HashSet::new),
        }
    }

    fn initial_state(function: AggregateFunction) -> AccumulatorState {
        match function {
            AggregateFunction::Count => AccumulatorState::Count(0),
            AggregateFunction::Sum | AggregateFunction::Avg => AccumulatorState::Sum {
                exact: Decimal::ZERO,
                approximate: None,
                count: 0,
            },
            AggregateFunction::Min | AggregateFunction::Max => AccumulatorState::Extremum(None),
            AggregateFunction::StringAgg => AccumulatorState::Strings(Vec::new()),
            AggregateFunction::ArrayAgg => AccumulatorState::Values(Vec::new()),
        }
    }

    pub fn call(&self) -> &AggregateCall {
        &self.call
    }

    /// Discard all running state
    pub fn reset(&mut self) {
        self.state = Self::initial_state(self.call.function);
        if let Some(seen) = &mut self.seen {
            seen.clear();
        }
    }

    /// Feed one source row
    pub fn process_row(&mut self, ctx: &EvalContext) -> SqlResult<()> {
        let value = match &self.call.argument {
            // COUNT(*)
            None => {
                if let AccumulatorState::Count(n) = &mut self.state {
                    *n += 1;
                }
                return Ok(());
            }
            Some(arg) => ExpressionEvaluator::evaluate_expression_value(arg, ctx)?,
        };
        let Some(value) = value else {
            return Ok(());
        };
        if let Some(seen) = &mut self.seen {
            if !seen.insert(value.clone()) {
                return Ok(());
            }
        }

        let function = self.call.function;
        match &mut self.state {
            AccumulatorState::Count(n) => *n += 1,
            AccumulatorState::Sum {
                exact,
                approximate,
                count,
            } => {
                let number = match &value {
                    FieldValue::String(s) if s.trim().is_empty() => return Ok(()),
                    FieldValue::String(s) => parse_numeric_text(s).ok_or_else(|| {
                        SqlError::type_error("numeric", "VARCHAR", Some(s.clone()))
                    })?,
                    v if v.is_numeric() => value.clone(),
                    v => {
                        return Err(SqlError::type_error(
                            "numeric",
                            v.type_name(),
                            Some(format!("{} in {}", v, function.name())),
                        ))
                    }
                };
                *count += 1;
                let as_f64 = number.to_f64().unwrap_or_default();
                if let Some(total) = approximate.as_mut() {
                    *total += as_f64;
                } else if let Some(total) = number.to_decimal().and_then(|d| exact.checked_add(d)) {
                    *exact = total;
                } else {
                    // no decimal form, or the decimal range is exceeded
                    *approximate = Some(exact.to_f64().unwrap_or_default() + as_f64);
                }
            }
            AccumulatorState::Extremum(current) => {
                let replace = match current {
                    None => true,
                    Some(existing) => {
                        let order = FieldValueComparator::sort_order(
                            Some(&value),
                            Some(&*existing),
                            &ctx.statement.converter,
                        );
                        match function {
                            AggregateFunction::Min => order == Ordering::Less,
                            _ => order == Ordering::Greater,
                        }
                    }
                };
                if replace {
                    *current = Some(value);
                }
            }
            AccumulatorState::Strings(parts) => {
                let text = match &value {
                    FieldValue::String(s) => s.clone(),
                    other => ctx.statement.converter.format(other),
                };
                parts.push(text);
            }
            AccumulatorState::Values(values) => values.push(value),
        }
        Ok(())
    }

    /// Final value. Empty input gives 0 for COUNT and NULL otherwise.
    pub fn value(&self) -> Option<FieldValue> {
        match &self.state {
            AccumulatorState::Count(n) => Some(FieldValue::Long(*n)),
            AccumulatorState::Sum {
                exact,
                approximate,
                count,
            } => {
                if *count == 0 {
                    return None;
                }
                let is_avg = self.call.function == AggregateFunction::Avg;
                if let Some(total) = approximate {
                    let total = if is_avg { total / *count as f64 } else { *total };
                    return Some(FieldValue::Double(total));
                }
                let result = if is_avg {
                    match exact.checked_div(Decimal::from(*count)) {
                        Some(avg) => avg,
                        None => {
                            return exact
                                .to_f64()
                                .map(|t| FieldValue::Double(t / *count as f64))
                        }
                    }
                } else {
                    *exact
                };
                decimal_result(result)
            }
            AccumulatorState::Extremum(value) => value.clone(),
            AccumulatorState::Strings(parts) => {
                if parts.is_empty() {
                    return None;
                }
                let delimiter = self
                    .call
                    .delimiter
                    .as_deref()
                    .unwrap_or(DEFAULT_STRING_AGG_DELIMITER);
                Some(FieldValue::String(parts.join(delimiter)))
            }
            AccumulatorState::Values(values) => {
                if values.is_empty() {
                    None
                } else {
                    Some(FieldValue::Array(values.clone()))
                }
            }
        }
    }

    /// Evaluate `call` over the member rows of one group with a fresh
    /// accumulator.
    pub fn evaluate_grouped(
        call: &AggregateCall,
        rows: &[RowEnvironment],
        ctx: &EvalContext,
    ) -> SqlResult<Option<FieldValue>> {
        let mut accumulator = Self::new(call);
        for row in rows {
            accumulator.process_row(&ctx.member(row))?;
        }
        Ok(accumulator.value())
    }
}

/// Whole numbers that fit become BIGINT, anything else DOUBLE
fn decimal_result(value: Decimal) -> Option<FieldValue> {
    if value.fract().is_zero() {
        if let Some(whole) = value.to_i64() {
            return Some(FieldValue::Long(whole));
        }
    }
    round_to_precision(value).to_f64().map(FieldValue::Double)
}

/// Computed aggregate results, looked up by call-site structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateValues {
    values: Vec<(AggregateCall, Option<FieldValue>)>,
}

impl AggregateValues {
    pub fn get(&self, call: &AggregateCall) -> Option<&Option<FieldValue>> {
        self.values.iter().find(|(c, _)| c == call).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The accumulators of one query, fed together in streaming mode.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorManager {
    accumulators: Vec<AggregateAccumulator>,
}

impl AccumulatorManager {
    /// One accumulator per distinct call-site
    pub fn new<'a>(calls: impl IntoIterator<Item = &'a AggregateCall>) -> Self {
        let mut accumulators: Vec<AggregateAccumulator> = Vec::new();
        for call in calls {
            if !accumulators.iter().any(|a| a.call() == call) {
                accumulators.push(AggregateAccumulator::new(call));
            }
        }
        Self { accumulators }
    }

    pub fn reset(&mut self) {
        self.accumulators.iter_mut().for_each(AggregateAccumulator::reset);
    }

    pub fn process_row(&mut self, ctx: &EvalContext) -> SqlResult<()> {
        for accumulator in &mut self.accumulators {
            accumulator.process_row(ctx)?;
        }
        Ok(())
    }

    pub fn values(&self) -> AggregateValues {
        AggregateValues {
            values: self
                .accumulators
                .iter()
                .map(|a| (a.call().clone(), a.value()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }
}
