//! Core value types of the query engine.
//!
//! - [`FieldValue`] - a typed, non-null scalar (absence of a value is `None`)
//! - [`DataType`] - the declared or inferred type of a column
//! - [`ResultColumn`] - metadata describing one output column of a query

use crate::sql::error::{SqlError, SqlResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A non-null value held by a row or produced by an expression.
///
/// SQL NULL is represented by `Option::None` wherever a value may be absent,
/// never by a variant of this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// UTF-8 text
    String(String),
    /// Boolean value (true/false)
    Boolean(bool),
    /// 8-bit signed integer
    Byte(i8),
    /// 16-bit signed integer
    Short(i16),
    /// 32-bit signed integer
    Integer(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit floating point number
    Float(f32),
    /// 64-bit floating point number
    Double(f64),
    /// Arbitrary precision decimal
    Decimal(Decimal),
    /// Calendar date (YYYY-MM-DD)
    Date(NaiveDate),
    /// Time of day (HH:MM:SS)
    Time(NaiveTime),
    /// Date and time of day
    Timestamp(NaiveDateTime),
    /// Raw byte sequence
    Bytes(Vec<u8>),
    /// Ordered list of values
    Array(Vec<FieldValue>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Byte(v) => write!(f, "{}", v),
            FieldValue::Short(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Long(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            FieldValue::Bytes(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            FieldValue::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Hashing supports DISTINCT sets and grouping keys. Floating point values
/// hash by bit pattern after folding `-0.0` into `0.0` and every NaN into
/// one pattern, so that equal values land in the same bucket.
impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            FieldValue::String(s) => s.hash(state),
            FieldValue::Boolean(b) => b.hash(state),
            FieldValue::Byte(v) => v.hash(state),
            FieldValue::Short(v) => v.hash(state),
            FieldValue::Integer(v) => v.hash(state),
            FieldValue::Long(v) => v.hash(state),
            FieldValue::Float(v) => canonical_f64(f64::from(*v)).hash(state),
            FieldValue::Double(v) => canonical_f64(*v).hash(state),
            // normalize so that 1.0 and 1.00 (equal decimals) hash alike
            FieldValue::Decimal(d) => d.normalize().hash(state),
            FieldValue::Date(d) => d.hash(state),
            FieldValue::Time(t) => t.hash(state),
            FieldValue::Timestamp(ts) => ts.hash(state),
            FieldValue::Bytes(b) => b.hash(state),
            FieldValue::Array(arr) => {
                arr.len().hash(state);
                for elem in arr {
                    elem.hash(state);
                }
            }
        }
    }
}

impl Eq for FieldValue {}

fn canonical_f64(v: f64) -> u64 {
    if v == 0.0 {
        0
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

impl FieldValue {
    /// The data type this value belongs to
    pub fn data_type(&self) -> DataType {
        match self {
            FieldValue::String(_) => DataType::String,
            FieldValue::Boolean(_) => DataType::Boolean,
            FieldValue::Byte(_) => DataType::Byte,
            FieldValue::Short(_) => DataType::Short,
            FieldValue::Integer(_) => DataType::Integer,
            FieldValue::Long(_) => DataType::Long,
            FieldValue::Float(_) => DataType::Float,
            FieldValue::Double(_) => DataType::Double,
            FieldValue::Decimal(_) => DataType::Decimal,
            FieldValue::Date(_) => DataType::Date,
            FieldValue::Time(_) => DataType::Time,
            FieldValue::Timestamp(_) => DataType::Timestamp,
            FieldValue::Bytes(_) => DataType::Bytes,
            FieldValue::Array(_) => DataType::Array,
        }
    }

    /// Get the SQL type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.data_type().sql_type_name()
    }

    /// True for integral, floating and decimal values
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating() || matches!(self, FieldValue::Decimal(_))
    }

    /// True for Byte, Short, Integer and Long
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            FieldValue::Byte(_) | FieldValue::Short(_) | FieldValue::Integer(_) | FieldValue::Long(_)
        )
    }

    /// True for Float and Double
    pub fn is_floating(&self) -> bool {
        matches!(self, FieldValue::Float(_) | FieldValue::Double(_))
    }

    /// True for Date, Time and Timestamp
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            FieldValue::Date(_) | FieldValue::Time(_) | FieldValue::Timestamp(_)
        )
    }

    /// Integral value widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Byte(v) => Some(*v as i64),
            FieldValue::Short(v) => Some(*v as i64),
            FieldValue::Integer(v) => Some(*v as i64),
            FieldValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value as an exact decimal. Non-finite floats have no decimal form.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Float(f) => Decimal::from_f32_retain(*f),
            FieldValue::Double(f) => {
                if f.is_finite() {
                    // go through the shortest round-tripping text so 0.1 stays 0.1
                    f.to_string().parse::<Decimal>().ok().or_else(|| Decimal::from_f64_retain(*f))
                } else {
                    None
                }
            }
            other => other.as_i64().map(Decimal::from),
        }
    }

    /// Numeric value as f64
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f as f64),
            FieldValue::Double(f) => Some(*f),
            FieldValue::Decimal(d) => d.to_f64(),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    /// Interpret a value as a truth value, used when a boolean column stands alone
    /// as a condition.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Milliseconds since midnight of a time value
    pub fn time_millis(time: &NaiveTime) -> i64 {
        time.num_seconds_from_midnight() as i64 * 1000 + (time.nanosecond() / 1_000_000) as i64
    }
}

/// The type of a column, as declared in table configuration or inferred from data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    Timestamp,
    Bytes,
    Array,
}

impl DataType {
    /// Order in which type inference tries candidate types before falling back
    /// to String.
    pub const INFERENCE_ORDER: [DataType; 9] = [
        DataType::Boolean,
        DataType::Integer,
        DataType::Long,
        DataType::Double,
        DataType::Bytes,
        DataType::Decimal,
        DataType::Timestamp,
        DataType::Date,
        DataType::Time,
    ];

    /// Resolve a declared type name (case-insensitive).
    pub fn from_name(name: &str) -> SqlResult<DataType> {
        let data_type = match name.trim().to_uppercase().as_str() {
            "STRING" | "VARCHAR" | "CHAR" | "TEXT" => DataType::String,
            "BOOLEAN" | "BOOL" => DataType::Boolean,
            "BYTE" | "TINYINT" => DataType::Byte,
            "SHORT" | "SMALLINT" => DataType::Short,
            "INT" | "INTEGER" => DataType::Integer,
            "LONG" | "BIGINT" => DataType::Long,
            "FLOAT" | "REAL" => DataType::Float,
            "DOUBLE" => DataType::Double,
            "BIGDECIMAL" | "DECIMAL" | "NUMERIC" => DataType::Decimal,
            "DATE" => DataType::Date,
            "TIME" => DataType::Time,
            "TIMESTAMP" | "DATETIME" => DataType::Timestamp,
            "BLOB" | "BYTES" | "BINARY" => DataType::Bytes,
            "ARRAY" => DataType::Array,
            other => {
                return Err(SqlError::configuration_error(format!(
                    "Unknown column type '{}'",
                    other
                )))
            }
        };
        Ok(data_type)
    }

    /// Name reported to SQL clients
    pub fn sql_type_name(&self) -> &'static str {
        match self {
            DataType::String => "VARCHAR",
            DataType::Boolean => "BOOLEAN",
            DataType::Byte => "TINYINT",
            DataType::Short => "SMALLINT",
            DataType::Integer => "INTEGER",
            DataType::Long => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Decimal => "DECIMAL",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Bytes => "BLOB",
            DataType::Array => "ARRAY",
        }
    }

    /// Suggested display width in characters
    pub fn display_size(&self) -> usize {
        match self {
            DataType::Boolean => 5,
            DataType::Byte => 4,
            DataType::Short => 6,
            DataType::Integer => 11,
            DataType::Long => 20,
            DataType::Float => 15,
            DataType::Double => 24,
            DataType::Decimal => 40,
            DataType::Date => 10,
            DataType::Time => 8,
            DataType::Timestamp => 29,
            DataType::String | DataType::Bytes | DataType::Array => 255,
        }
    }

    /// A representative value of this type, used to infer expression result
    /// types without real data.
    pub fn default_value(&self) -> FieldValue {
        match self {
            DataType::String => FieldValue::String(String::new()),
            DataType::Boolean => FieldValue::Boolean(false),
            DataType::Byte => FieldValue::Byte(1),
            DataType::Short => FieldValue::Short(1),
            DataType::Integer => FieldValue::Integer(1),
            DataType::Long => FieldValue::Long(1),
            DataType::Float => FieldValue::Float(1.0),
            DataType::Double => FieldValue::Double(1.0),
            DataType::Decimal => FieldValue::Decimal(Decimal::ONE),
            DataType::Date => FieldValue::Date(NaiveDate::default()),
            DataType::Time => FieldValue::Time(NaiveTime::default()),
            DataType::Timestamp => FieldValue::Timestamp(NaiveDateTime::default()),
            DataType::Bytes => FieldValue::Bytes(Vec::new()),
            DataType::Array => FieldValue::Array(Vec::new()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_type_name())
    }
}

/// Metadata for one output column of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    /// Output name (alias, column name, or rendered expression)
    pub name: String,
    /// Display label
    pub label: String,
    /// Inferred result type
    pub data_type: DataType,
    /// SQL-facing type name
    pub type_name: String,
    /// Suggested display width
    pub display_size: usize,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            data_type,
            type_name: data_type.sql_type_name().to_string(),
            display_size: data_type.display_size(),
        }
    }
}
