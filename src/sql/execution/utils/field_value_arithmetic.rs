/// Field Value Arithmetic Utilities
///
/// Binary arithmetic between FieldValue instances. Combinations without a
/// defined meaning produce NULL rather than an error; division and modulo
/// by an exact zero are the only operand-driven failures.
use crate::sql::ast::ArithmeticOperator;
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::types::FieldValue;
use chrono::{Duration, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Significant digits kept by decimal arithmetic before conversion to f64
pub const ARITHMETIC_PRECISION: u32 = 14;

/// Utility class for arithmetic on FieldValue instances
pub struct FieldValueArithmetic;

impl FieldValueArithmetic {
    /// Apply `op` to two non-null operands.
    pub fn apply(
        left: &FieldValue,
        op: ArithmeticOperator,
        right: &FieldValue,
        converter: &TypeConverter,
    ) -> SqlResult<Option<FieldValue>> {
        if op == ArithmeticOperator::Concat {
            return Ok(Some(Self::concat(left, right, converter)));
        }

        if left.is_numeric() && right.is_numeric() {
            return Self::numeric(left, op, right);
        }

        if op != ArithmeticOperator::Add {
            // text operands of -, *, / and % are read as numbers
            if let (Some(l), Some(r)) = (numeric_operand(left), numeric_operand(right)) {
                return Self::numeric(&l, op, &r);
            }
        }

        if left.is_temporal() || right.is_temporal() {
            if let Some(value) = Self::temporal(left, op, right)? {
                return Ok(Some(value));
            }
        }

        let is_text = |v: &FieldValue| matches!(v, FieldValue::String(_));
        if op == ArithmeticOperator::Add && (is_text(left) || is_text(right)) {
            return Ok(Some(Self::concat(left, right, converter)));
        }

        Ok(None)
    }

    /// Unary minus
    pub fn negate(value: &FieldValue) -> SqlResult<Option<FieldValue>> {
        let negated = match value {
            FieldValue::Byte(v) => FieldValue::Integer(-(*v as i32)),
            FieldValue::Short(v) => FieldValue::Integer(-(*v as i32)),
            FieldValue::Integer(v) => match v.checked_neg() {
                Some(n) => FieldValue::Integer(n),
                None => FieldValue::Long(-(*v as i64)),
            },
            FieldValue::Long(v) => FieldValue::Long(v.checked_neg().ok_or_else(|| {
                SqlError::execution_error(format!("Integer overflow negating {}", v))
            })?),
            FieldValue::Float(v) => FieldValue::Float(-v),
            FieldValue::Double(v) => FieldValue::Double(-v),
            FieldValue::Decimal(d) => FieldValue::Decimal(-*d),
            _ => return Ok(None),
        };
        Ok(Some(negated))
    }

    fn concat(left: &FieldValue, right: &FieldValue, converter: &TypeConverter) -> FieldValue {
        let mut text = converter.format(left);
        text.push_str(&converter.format(right));
        FieldValue::String(text)
    }

    fn numeric(
        left: &FieldValue,
        op: ArithmeticOperator,
        right: &FieldValue,
    ) -> SqlResult<Option<FieldValue>> {
        if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
            let wide = matches!(left, FieldValue::Long(_)) || matches!(right, FieldValue::Long(_));
            return Self::integral(a, op, b, wide).map(Some);
        }

        let floating = left.is_floating() || right.is_floating();
        let (a, b) = match (left.to_decimal(), right.to_decimal()) {
            (Some(a), Some(b)) if !(floating && b.is_zero() && is_division(op)) => (a, b),
            _ => {
                // NaN, infinity or a float zero divisor: IEEE semantics
                return Ok(Self::floating(left, op, right));
            }
        };

        if is_division(op) && b.is_zero() {
            return Err(SqlError::execution_error("Division by zero"));
        }

        let exact = match op {
            ArithmeticOperator::Add => a.checked_add(b),
            ArithmeticOperator::Subtract => a.checked_sub(b),
            ArithmeticOperator::Multiply => a.checked_mul(b),
            ArithmeticOperator::Divide => a.checked_div(b),
            ArithmeticOperator::Modulo => a.checked_rem(b),
            ArithmeticOperator::Concat => None,
        };
        match exact {
            Some(result) => Ok(round_to_precision(result)
                .to_f64()
                .map(FieldValue::Double)),
            // decimal range exceeded, fall back to binary floating point
            None => Ok(Self::floating(left, op, right)),
        }
    }

    fn integral(a: i64, op: ArithmeticOperator, b: i64, wide: bool) -> SqlResult<FieldValue> {
        if is_division(op) && b == 0 {
            return Err(SqlError::execution_error("Division by zero"));
        }
        let result = match op {
            ArithmeticOperator::Add => a.checked_add(b),
            ArithmeticOperator::Subtract => a.checked_sub(b),
            ArithmeticOperator::Multiply => a.checked_mul(b),
            ArithmeticOperator::Divide => a.checked_div(b),
            ArithmeticOperator::Modulo => a.checked_rem(b),
            ArithmeticOperator::Concat => None,
        }
        .ok_or_else(|| {
            SqlError::execution_error(format!(
                "Integer overflow in {} {} {}",
                a,
                op.symbol(),
                b
            ))
        })?;

        if !wide {
            if let Ok(narrow) = i32::try_from(result) {
                return Ok(FieldValue::Integer(narrow));
            }
        }
        Ok(FieldValue::Long(result))
    }

    fn floating(left: &FieldValue, op: ArithmeticOperator, right: &FieldValue) -> Option<FieldValue> {
        let (a, b) = (left.to_f64()?, right.to_f64()?);
        let result = match op {
            ArithmeticOperator::Add => a + b,
            ArithmeticOperator::Subtract => a - b,
            ArithmeticOperator::Multiply => a * b,
            ArithmeticOperator::Divide => a / b,
            ArithmeticOperator::Modulo => a % b,
            ArithmeticOperator::Concat => return None,
        };
        Some(FieldValue::Double(result))
    }

    /// Date and time combinations. `Ok(None)` means the pair is not temporal
    /// arithmetic and the caller may try other rules.
    fn temporal(
        left: &FieldValue,
        op: ArithmeticOperator,
        right: &FieldValue,
    ) -> SqlResult<Option<FieldValue>> {
        use ArithmeticOperator::{Add, Subtract};
        use FieldValue::*;

        let value = match (left, op, right) {
            (Date(d), Add | Subtract, n) if n.is_integral() => {
                let days = signed(n, op)?;
                Duration::try_days(days)
                    .and_then(|delta| d.checked_add_signed(delta))
                    .map(Date)
            }
            (n, Add, Date(d)) if n.is_integral() => {
                let days = n.as_i64().unwrap_or_default();
                Duration::try_days(days)
                    .and_then(|delta| d.checked_add_signed(delta))
                    .map(Date)
            }
            (Date(a), Subtract, Date(b)) => Some(Long((*a - *b).num_days())),
            (Date(d), Add, Time(t)) | (Time(t), Add, Date(d)) => {
                Some(Timestamp(NaiveDateTime::new(*d, *t)))
            }
            (Timestamp(ts), Add | Subtract, n) if n.is_integral() => {
                let millis = signed(n, op)?;
                Duration::try_milliseconds(millis)
                    .and_then(|delta| ts.checked_add_signed(delta))
                    .map(Timestamp)
            }
            (n, Add, Timestamp(ts)) if n.is_integral() => {
                let millis = n.as_i64().unwrap_or_default();
                Duration::try_milliseconds(millis)
                    .and_then(|delta| ts.checked_add_signed(delta))
                    .map(Timestamp)
            }
            (Timestamp(a), Subtract, Timestamp(b)) => {
                Some(Long((*a - *b).num_milliseconds()))
            }
            (Time(t), Add | Subtract, n) if n.is_integral() => {
                let millis = signed(n, op)?;
                Duration::try_milliseconds(millis)
                    .map(|delta| Time(t.overflowing_add_signed(delta).0))
            }
            (Time(a), Subtract, Time(b)) => Some(Long(
                FieldValue::time_millis(a) - FieldValue::time_millis(b),
            )),
            _ => None,
        };
        Ok(value)
    }
}

/// A numeric operand, parsing text when needed
fn numeric_operand(value: &FieldValue) -> Option<FieldValue> {
    match value {
        FieldValue::String(s) => parse_numeric_text(s),
        v if v.is_numeric() => Some(v.clone()),
        _ => None,
    }
}

/// Read text as the narrowest numeric value that holds it exactly:
/// Integer, Long, Decimal, then Double for exponent notation.
pub fn parse_numeric_text(text: &str) -> Option<FieldValue> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i32>() {
        Some(FieldValue::Integer(i))
    } else if let Ok(l) = text.parse::<i64>() {
        Some(FieldValue::Long(l))
    } else if let Ok(d) = text.parse::<Decimal>() {
        Some(FieldValue::Decimal(d))
    } else {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(FieldValue::Double)
    }
}

fn is_division(op: ArithmeticOperator) -> bool {
    matches!(op, ArithmeticOperator::Divide | ArithmeticOperator::Modulo)
}

/// Integral operand negated for subtraction
fn signed(value: &FieldValue, op: ArithmeticOperator) -> SqlResult<i64> {
    let n = value.as_i64().unwrap_or_default();
    if op == ArithmeticOperator::Subtract {
        n.checked_neg()
            .ok_or_else(|| SqlError::execution_error(format!("Integer overflow negating {}", n)))
    } else {
        Ok(n)
    }
}

/// Round to [`ARITHMETIC_PRECISION`] significant digits, half away from zero.
pub fn round_to_precision(value: Decimal) -> Decimal {
    value
        .round_sf_with_strategy(ARITHMETIC_PRECISION, RoundingStrategy::MidpointAwayFromZero)
        .unwrap_or(value)
}
