//! Built-in SQL scalar functions.
//!
//! - **Math** (ABS, ROUND, CEIL, FLOOR, RANDOM)
//! - **String** (UPPER, LOWER, TRIM, LTRIM, RTRIM, LENGTH, SUBSTRING, REPLACE, SOUNDEX, DIFFERENCE)
//! - **Conditional** (COALESCE, IFNULL, NULLIF)
//! - **Date/Time** (DAYOFMONTH, DAYOFWEEK, DAYOFYEAR, MONTH, YEAR, HOUROFDAY, MINUTE, SECOND,
//!   CURRENT_DATE, CURRENT_TIME, CURRENT_TIMESTAMP)
//! - **Scalar** (TO_NUMBER, TO_ARRAY, VERSION)
//!
//! Handlers receive already evaluated arguments. Unless documented otherwise a
//! NULL in any required argument makes the result NULL.

use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::environment::StatementContext;
use crate::sql::execution::types::FieldValue;
use crate::sql::execution::utils::field_value_arithmetic::parse_numeric_text;
use crate::sql::execution::utils::FieldValueComparator;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Function handler signature
pub type FunctionHandler =
    fn(&[Option<FieldValue>], &StatementContext) -> SqlResult<Option<FieldValue>>;

/// Metadata of one built-in function
#[derive(Debug, Clone, Copy)]
pub struct SqlFunctionDef {
    /// Primary function name (uppercase)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    pub category: FunctionCategory,
    pub min_args: usize,
    /// `None` for any number of arguments
    pub max_args: Option<usize>,
    pub handler: FunctionHandler,
}

impl SqlFunctionDef {
    pub fn accepts(&self, arity: usize) -> bool {
        arity >= self.min_args && self.max_args.map_or(true, |max| arity <= max)
    }
}

/// Categories of SQL functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    String,
    Math,
    DateTime,
    Conditional,
    Scalar,
}

macro_rules! builtin {
    ($name:expr, [$($alias:expr),*], $category:ident, $min:expr, $max:expr, $handler:ident) => {
        SqlFunctionDef {
            name: $name,
            aliases: &[$($alias),*],
            category: FunctionCategory::$category,
            min_args: $min,
            max_args: $max,
            handler: BuiltinFunctions::$handler,
        }
    };
}

static BUILTIN_FUNCTIONS: &[SqlFunctionDef] = &[
    builtin!("ABS", [], Math, 1, Some(1), abs_function),
    builtin!("ROUND", [], Math, 1, Some(2), round_function),
    builtin!("CEIL", ["CEILING"], Math, 1, Some(1), ceil_function),
    builtin!("FLOOR", [], Math, 1, Some(1), floor_function),
    builtin!("RANDOM", ["RAND"], Math, 0, Some(0), random_function),
    builtin!("UPPER", ["UCASE"], String, 1, Some(1), upper_function),
    builtin!("LOWER", ["LCASE"], String, 1, Some(1), lower_function),
    builtin!("TRIM", [], String, 1, Some(2), trim_function),
    builtin!("LTRIM", [], String, 1, Some(2), ltrim_function),
    builtin!("RTRIM", [], String, 1, Some(2), rtrim_function),
    builtin!("LENGTH", ["CHAR_LENGTH", "LEN"], String, 1, Some(1), length_function),
    builtin!("SUBSTRING", ["SUBSTR"], String, 2, Some(3), substring_function),
    builtin!("REPLACE", [], String, 3, Some(3), replace_function),
    builtin!("SOUNDEX", [], String, 1, Some(1), soundex_function),
    builtin!("DIFFERENCE", [], String, 2, Some(2), difference_function),
    builtin!("COALESCE", [], Conditional, 1, None, coalesce_function),
    builtin!("IFNULL", ["NVL"], Conditional, 2, Some(2), coalesce_function),
    builtin!("NULLIF", [], Conditional, 2, Some(2), nullif_function),
    builtin!("DAYOFMONTH", ["DAY"], DateTime, 1, Some(1), dayofmonth_function),
    builtin!("DAYOFWEEK", [], DateTime, 1, Some(1), dayofweek_function),
    builtin!("DAYOFYEAR", [], DateTime, 1, Some(1), dayofyear_function),
    builtin!("MONTH", [], DateTime, 1, Some(1), month_function),
    builtin!("YEAR", [], DateTime, 1, Some(1), year_function),
    builtin!("HOUROFDAY", ["HOUR"], DateTime, 1, Some(1), hourofday_function),
    builtin!("MINUTE", [], DateTime, 1, Some(1), minute_function),
    builtin!("SECOND", [], DateTime, 1, Some(1), second_function),
    builtin!("CURRENT_DATE", [], DateTime, 0, Some(0), current_date_function),
    builtin!("CURRENT_TIME", [], DateTime, 0, Some(0), current_time_function),
    builtin!("CURRENT_TIMESTAMP", ["NOW"], DateTime, 0, Some(0), current_timestamp_function),
    builtin!("TO_NUMBER", [], Scalar, 1, Some(1), to_number_function),
    builtin!("TO_ARRAY", [], Scalar, 0, None, to_array_function),
    builtin!("VERSION", [], Scalar, 0, Some(0), version_function),
];

/// Upper-case names and aliases to definitions
static FUNCTION_LOOKUP_CACHE: LazyLock<HashMap<&'static str, &'static SqlFunctionDef>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();
        for func_def in BUILTIN_FUNCTIONS {
            map.insert(func_def.name, func_def);
            for alias in func_def.aliases {
                map.insert(*alias, func_def);
            }
        }
        map
    });

/// Find a built-in function by name (case-insensitive)
pub fn find_function(name: &str) -> Option<&'static SqlFunctionDef> {
    FUNCTION_LOOKUP_CACHE
        .get(name.to_uppercase().as_str())
        .copied()
}

/// All built-in functions
pub fn all_builtin_functions() -> impl Iterator<Item = &'static SqlFunctionDef> {
    BUILTIN_FUNCTIONS.iter()
}

fn arg(args: &[Option<FieldValue>], index: usize) -> Option<&FieldValue> {
    args.get(index).and_then(|a| a.as_ref())
}

fn text_of(value: &FieldValue, ctx: &StatementContext) -> String {
    match value {
        FieldValue::String(s) => s.clone(),
        other => ctx.converter.format(other),
    }
}

fn integer_arg(value: &FieldValue, function: &str) -> SqlResult<i64> {
    match value {
        v if v.is_integral() => Ok(v.as_i64().unwrap_or_default()),
        FieldValue::String(s) => s.trim().parse::<i64>().map_err(|_| {
            SqlError::type_error("INTEGER", "VARCHAR", Some(format!("{} in {}", s, function)))
        }),
        v => v
            .to_decimal()
            .and_then(|d| d.trunc().to_i64())
            .ok_or_else(|| SqlError::type_error("INTEGER", v.type_name(), Some(v.to_string()))),
    }
}

/// Numeric view of an argument, reading text as a number
fn numeric_arg(value: &FieldValue, function: &str) -> SqlResult<FieldValue> {
    match value {
        v if v.is_numeric() => Ok(v.clone()),
        FieldValue::String(s) => parse_numeric_text(s).ok_or_else(|| {
            SqlError::type_error("numeric", "VARCHAR", Some(format!("{} in {}", s, function)))
        }),
        v => Err(SqlError::type_error("numeric", v.type_name(), Some(v.to_string()))),
    }
}

/// Date and time-of-day parts of a temporal argument
fn temporal_parts(
    value: &FieldValue,
    ctx: &StatementContext,
) -> (Option<NaiveDate>, Option<NaiveTime>) {
    match value {
        FieldValue::Date(d) => (Some(*d), None),
        FieldValue::Time(t) => (None, Some(*t)),
        FieldValue::Timestamp(ts) => (Some(ts.date()), Some(ts.time())),
        FieldValue::String(s) => {
            if let Some(ts) = ctx.converter.parse_timestamp(s) {
                (Some(ts.date()), Some(ts.time()))
            } else if let Some(d) = ctx.converter.parse_date(s) {
                (Some(d), None)
            } else {
                (None, ctx.converter.parse_time(s))
            }
        }
        _ => (None, None),
    }
}

fn round_decimal(value: Decimal, digits: i64) -> Decimal {
    let strategy = RoundingStrategy::MidpointAwayFromZero;
    if digits >= 0 {
        return value.round_dp_with_strategy(digits.min(28) as u32, strategy);
    }
    let factor = Decimal::from(10_i64.pow((-digits).min(18) as u32));
    value
        .checked_div(factor)
        .map(|d| d.round_dp_with_strategy(0, strategy))
        .and_then(|d| d.checked_mul(factor))
        .unwrap_or(Decimal::ZERO)
}

fn soundex(text: &str) -> String {
    fn code(c: char) -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let mut letters = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase());
    let Some(first) = letters.next() else {
        return String::new();
    };
    let mut out = String::with_capacity(4);
    out.push(first);
    let mut last = code(first);
    for c in letters {
        if out.len() == 4 {
            break;
        }
        match code(c) {
            Some(digit) if Some(digit) != last => {
                out.push(digit);
                last = Some(digit);
            }
            Some(_) => {}
            // H and W do not separate equal codes, vowels do
            None if c == 'H' || c == 'W' => {}
            None => last = None,
        }
    }
    while out.len() < 4 {
        out.push('0');
    }
    out
}

/// Provides built-in SQL function implementations
pub struct BuiltinFunctions;

impl BuiltinFunctions {
    fn abs_function(args: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        let result = match numeric_arg(value, "ABS")? {
            FieldValue::Byte(v) => FieldValue::Integer((v as i32).abs()),
            FieldValue::Short(v) => FieldValue::Integer((v as i32).abs()),
            FieldValue::Integer(v) => match v.checked_abs() {
                Some(a) => FieldValue::Integer(a),
                None => FieldValue::Long((v as i64).abs()),
            },
            FieldValue::Long(v) => FieldValue::Long(v.checked_abs().ok_or_else(|| {
                SqlError::execution_error(format!("Integer overflow in ABS({})", v))
            })?),
            FieldValue::Float(v) => FieldValue::Float(v.abs()),
            FieldValue::Double(v) => FieldValue::Double(v.abs()),
            FieldValue::Decimal(d) => FieldValue::Decimal(d.abs()),
            other => other,
        };
        Ok(Some(result))
    }

    /// ROUND(x [, digits]). Without digits a non-integral x rounds to a BIGINT.
    fn round_function(args: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        let digits = match args.get(1) {
            None => None,
            Some(None) => return Ok(None),
            Some(Some(d)) => Some(integer_arg(d, "ROUND")?),
        };
        let value = numeric_arg(value, "ROUND")?;

        if value.is_integral() {
            return match digits {
                Some(d) if d < 0 => {
                    let exact = value.to_decimal().unwrap_or_default();
                    Ok(round_decimal(exact, d).to_i64().map(FieldValue::Long))
                }
                _ => Ok(Some(value)),
            };
        }
        if let FieldValue::Decimal(d) = value {
            return Ok(Some(FieldValue::Decimal(round_decimal(d, digits.unwrap_or(0)))));
        }

        let Some(exact) = value.to_decimal() else {
            // NaN and infinities round to themselves
            return Ok(Some(value));
        };
        let rounded = round_decimal(exact, digits.unwrap_or(0));
        match digits {
            None => Ok(rounded.to_i64().map(FieldValue::Long)),
            Some(_) => Ok(rounded.to_f64().map(FieldValue::Double)),
        }
    }

    fn ceil_function(args: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        Ok(Some(match numeric_arg(value, "CEIL")? {
            FieldValue::Float(v) => FieldValue::Float(v.ceil()),
            FieldValue::Double(v) => FieldValue::Double(v.ceil()),
            FieldValue::Decimal(d) => FieldValue::Decimal(d.ceil()),
            other => other,
        }))
    }

    fn floor_function(args: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        Ok(Some(match numeric_arg(value, "FLOOR")? {
            FieldValue::Float(v) => FieldValue::Float(v.floor()),
            FieldValue::Double(v) => FieldValue::Double(v.floor()),
            FieldValue::Decimal(d) => FieldValue::Decimal(d.floor()),
            other => other,
        }))
    }

    fn random_function(_: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(Some(FieldValue::Double(ctx.next_random())))
    }

    fn upper_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(arg(args, 0).map(|v| FieldValue::String(text_of(v, ctx).to_uppercase())))
    }

    fn lower_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(arg(args, 0).map(|v| FieldValue::String(text_of(v, ctx).to_lowercase())))
    }

    fn trim_with(
        args: &[Option<FieldValue>],
        ctx: &StatementContext,
        trim: fn(&str, &[char]) -> String,
    ) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        let chars: Vec<char> = match args.get(1) {
            None => vec![' ', '\t', '\n', '\r'],
            Some(None) => return Ok(None),
            Some(Some(set)) => text_of(set, ctx).chars().collect(),
        };
        Ok(Some(FieldValue::String(trim(&text_of(value, ctx), &chars))))
    }

    fn trim_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::trim_with(args, ctx, |s, chars| s.trim_matches(chars).to_string())
    }

    fn ltrim_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::trim_with(args, ctx, |s, chars| s.trim_start_matches(chars).to_string())
    }

    fn rtrim_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::trim_with(args, ctx, |s, chars| s.trim_end_matches(chars).to_string())
    }

    fn length_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(arg(args, 0).map(|v| FieldValue::Integer(text_of(v, ctx).chars().count() as i32)))
    }

    /// SUBSTRING(s, start [, length]) with a one-based start. Positions before
    /// the first character shorten the result.
    fn substring_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let (Some(value), Some(start)) = (arg(args, 0), arg(args, 1)) else {
            return Ok(None);
        };
        let length = match args.get(2) {
            None => None,
            Some(None) => return Ok(None),
            Some(Some(len)) => Some(integer_arg(len, "SUBSTRING")?),
        };
        if let Some(len) = length {
            if len < 0 {
                return Err(SqlError::execution_error(format!(
                    "SUBSTRING length must not be negative, got {}",
                    len
                )));
            }
        }

        let chars: Vec<char> = text_of(value, ctx).chars().collect();
        let begin = integer_arg(start, "SUBSTRING")?.saturating_sub(1);
        let end = length.map_or(i64::MAX, |len| begin.saturating_add(len));
        let begin = begin.clamp(0, chars.len() as i64) as usize;
        let end = end.clamp(0, chars.len() as i64) as usize;
        let result: String = if begin < end {
            chars[begin..end].iter().collect()
        } else {
            String::new()
        };
        Ok(Some(FieldValue::String(result)))
    }

    fn replace_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let (Some(value), Some(from), Some(to)) = (arg(args, 0), arg(args, 1), arg(args, 2)) else {
            return Ok(None);
        };
        let text = text_of(value, ctx);
        let from = text_of(from, ctx);
        if from.is_empty() {
            return Ok(Some(FieldValue::String(text)));
        }
        Ok(Some(FieldValue::String(text.replace(&from, &text_of(to, ctx)))))
    }

    fn soundex_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(arg(args, 0).map(|v| FieldValue::String(soundex(&text_of(v, ctx)))))
    }

    /// Number of matching SOUNDEX positions, 0 to 4
    fn difference_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let (Some(a), Some(b)) = (arg(args, 0), arg(args, 1)) else {
            return Ok(None);
        };
        let (a, b) = (soundex(&text_of(a, ctx)), soundex(&text_of(b, ctx)));
        let same = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
        Ok(Some(FieldValue::Integer(same as i32)))
    }

    /// First non-null argument
    fn coalesce_function(args: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(args.iter().flatten().next().cloned())
    }

    /// NULL when both arguments compare equal, otherwise the first
    fn nullif_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let Some(first) = arg(args, 0) else {
            return Ok(None);
        };
        let Some(second) = arg(args, 1) else {
            return Ok(Some(first.clone()));
        };
        match FieldValueComparator::values_equal(first, second, &ctx.converter) {
            Some(true) => Ok(None),
            _ => Ok(Some(first.clone())),
        }
    }

    fn date_field(
        args: &[Option<FieldValue>],
        ctx: &StatementContext,
        extract: fn(&NaiveDate) -> u32,
    ) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        Ok(temporal_parts(value, ctx)
            .0
            .map(|d| FieldValue::Integer(extract(&d) as i32)))
    }

    fn time_field(
        args: &[Option<FieldValue>],
        ctx: &StatementContext,
        extract: fn(&NaiveTime) -> u32,
    ) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        Ok(temporal_parts(value, ctx)
            .1
            .map(|t| FieldValue::Integer(extract(&t) as i32)))
    }

    fn dayofmonth_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::date_field(args, ctx, |d| d.day())
    }

    /// Sunday is 1, Saturday is 7
    fn dayofweek_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::date_field(args, ctx, |d| d.weekday().number_from_sunday())
    }

    fn dayofyear_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::date_field(args, ctx, |d| d.ordinal())
    }

    fn month_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::date_field(args, ctx, |d| d.month())
    }

    fn year_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let Some(value) = arg(args, 0) else {
            return Ok(None);
        };
        Ok(temporal_parts(value, ctx).0.map(|d| FieldValue::Integer(d.year())))
    }

    fn hourofday_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::time_field(args, ctx, |t| t.hour())
    }

    fn minute_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::time_field(args, ctx, |t| t.minute())
    }

    fn second_function(args: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Self::time_field(args, ctx, |t| t.second())
    }

    fn current_date_function(_: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(Some(FieldValue::Date(ctx.now.date())))
    }

    fn current_time_function(_: &[Option<FieldValue>], ctx: &StatementContext) -> SqlResult<Option<FieldValue>> {
        let time = ctx.now.time();
        Ok(Some(FieldValue::Time(time.with_nanosecond(0).unwrap_or(time))))
    }

    fn current_timestamp_function(
        _: &[Option<FieldValue>],
        ctx: &StatementContext,
    ) -> SqlResult<Option<FieldValue>> {
        Ok(Some(FieldValue::Timestamp(ctx.now)))
    }

    /// Numbers pass through, text is parsed, anything unreadable is NULL
    fn to_number_function(args: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(match arg(args, 0) {
            Some(v) if v.is_numeric() => Some(v.clone()),
            Some(FieldValue::String(s)) => parse_numeric_text(s),
            _ => None,
        })
    }

    /// Array of the non-null arguments
    fn to_array_function(args: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(Some(FieldValue::Array(args.iter().flatten().cloned().collect())))
    }

    fn version_function(_: &[Option<FieldValue>], _: &StatementContext) -> SqlResult<Option<FieldValue>> {
        Ok(Some(FieldValue::String(format!(
            "flatsql {}",
            crate::sql::VERSION
        ))))
    }
}
