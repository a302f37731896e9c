//! Text <-> typed value conversion.
//!
//! A [`TypeConverter`] carries the date, time and timestamp formats of one
//! table. Formats may be given either as chrono `strftime` strings or as
//! Java-style patterns (`yyyy-MM-dd HH:mm:ss`); both are validated when the
//! converter is built so that a bad format fails at setup, not per row.

use crate::sql::error::{SqlError, SqlResult};
use crate::sql::execution::types::{DataType, FieldValue};
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Converts raw field text into typed values and back.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeConverter {
    date_format: String,
    time_format: String,
    timestamp_format: String,
    lenient_timestamps: bool,
}

impl Default for TypeConverter {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            lenient_timestamps: true,
        }
    }
}

impl TypeConverter {
    /// Build a converter, validating every supplied format.
    pub fn new(
        date_format: Option<&str>,
        time_format: Option<&str>,
        timestamp_format: Option<&str>,
    ) -> SqlResult<Self> {
        let mut converter = Self::default();
        if let Some(fmt) = date_format {
            converter.date_format = normalize_format(fmt)?;
        }
        if let Some(fmt) = time_format {
            converter.time_format = normalize_format(fmt)?;
        }
        if let Some(fmt) = timestamp_format {
            converter.timestamp_format = normalize_format(fmt)?;
            converter.lenient_timestamps = false;
        }
        Ok(converter)
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }

    /// Parse raw text as the given type.
    ///
    /// Unparseable text yields `None` (SQL NULL) rather than an error. Empty
    /// text is NULL for every type except String.
    pub fn parse_typed(&self, raw: &str, data_type: DataType) -> Option<FieldValue> {
        if raw.is_empty() && data_type != DataType::String {
            return None;
        }
        match data_type {
            DataType::String => Some(FieldValue::String(raw.to_string())),
            DataType::Boolean => {
                if raw.eq_ignore_ascii_case("true") {
                    Some(FieldValue::Boolean(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Some(FieldValue::Boolean(false))
                } else {
                    None
                }
            }
            DataType::Byte => raw.parse::<i8>().ok().map(FieldValue::Byte),
            DataType::Short => raw.parse::<i16>().ok().map(FieldValue::Short),
            DataType::Integer => raw.parse::<i32>().ok().map(FieldValue::Integer),
            DataType::Long => raw.parse::<i64>().ok().map(FieldValue::Long),
            DataType::Float => raw.parse::<f32>().ok().map(FieldValue::Float),
            DataType::Double => raw.parse::<f64>().ok().map(FieldValue::Double),
            DataType::Decimal => Decimal::from_str(raw)
                .or_else(|_| Decimal::from_scientific(raw))
                .ok()
                .map(FieldValue::Decimal),
            DataType::Date => self.parse_date(raw).map(FieldValue::Date),
            DataType::Time => self.parse_time(raw).map(FieldValue::Time),
            DataType::Timestamp => self.parse_timestamp(raw).map(FieldValue::Timestamp),
            DataType::Bytes => parse_hex(raw).map(FieldValue::Bytes),
            DataType::Array => None,
        }
    }

    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw.trim(), &self.date_format).ok()
    }

    pub fn parse_time(&self, raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw.trim(), &self.time_format).ok()
    }

    pub fn parse_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, &self.timestamp_format) {
            return Some(ts);
        }
        if self.lenient_timestamps {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(ts);
            }
        }
        None
    }

    /// Format a value the way this converter would parse it back.
    pub fn format(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Date(d) => d.format(&self.date_format).to_string(),
            FieldValue::Time(t) => t.format(&self.time_format).to_string(),
            FieldValue::Timestamp(ts) => ts.format(&self.timestamp_format).to_string(),
            other => other.to_string(),
        }
    }

    /// Format an optional value, rendering NULL as the empty string.
    pub fn format_opt(&self, value: Option<&FieldValue>) -> String {
        value.map(|v| self.format(v)).unwrap_or_default()
    }

    /// Infer a column type from sample text.
    ///
    /// Candidates are tried in [`DataType::INFERENCE_ORDER`]; the first type for
    /// which every non-empty sample survives a parse-then-format round trip
    /// unchanged wins. Columns without any such type are String.
    pub fn infer<S: AsRef<str>>(&self, samples: &[S]) -> DataType {
        let samples: Vec<&str> = samples
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .collect();
        if samples.is_empty() {
            return DataType::String;
        }
        DataType::INFERENCE_ORDER
            .iter()
            .copied()
            .find(|candidate| {
                samples.iter().all(|raw| {
                    self.parse_typed(raw, *candidate)
                        .map(|v| self.format(&v) == *raw)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(DataType::String)
    }

    /// Convert a value to another type, failing with a type error when the
    /// conversion is not defined.
    pub fn coerce(&self, value: FieldValue, target: DataType) -> SqlResult<FieldValue> {
        if value.data_type() == target {
            return Ok(value);
        }
        let failed = |value: &FieldValue| {
            SqlError::type_error(
                target.sql_type_name(),
                value.type_name(),
                Some(value.to_string()),
            )
        };
        if let FieldValue::String(s) = &value {
            return self.parse_typed(s.trim(), target).ok_or_else(|| failed(&value));
        }
        let converted = match target {
            DataType::String => Some(FieldValue::String(self.format(&value))),
            DataType::Boolean => match &value {
                v if v.is_integral() => v.as_i64().map(|i| FieldValue::Boolean(i != 0)),
                _ => None,
            },
            DataType::Byte => integral_of(&value).and_then(|i| i8::try_from(i).ok()).map(FieldValue::Byte),
            DataType::Short => integral_of(&value)
                .and_then(|i| i16::try_from(i).ok())
                .map(FieldValue::Short),
            DataType::Integer => integral_of(&value)
                .and_then(|i| i32::try_from(i).ok())
                .map(FieldValue::Integer),
            DataType::Long => integral_of(&value).map(FieldValue::Long),
            DataType::Float => value.to_f64().map(|f| FieldValue::Float(f as f32)),
            DataType::Double => value.to_f64().map(FieldValue::Double),
            DataType::Decimal => value.to_decimal().map(FieldValue::Decimal),
            DataType::Date => match &value {
                FieldValue::Timestamp(ts) => Some(FieldValue::Date(ts.date())),
                _ => None,
            },
            DataType::Time => match &value {
                FieldValue::Timestamp(ts) => Some(FieldValue::Time(ts.time())),
                _ => None,
            },
            DataType::Timestamp => match &value {
                FieldValue::Date(d) => Some(FieldValue::Timestamp(d.and_time(NaiveTime::MIN))),
                _ => None,
            },
            DataType::Bytes => None,
            DataType::Array => Some(FieldValue::Array(vec![value.clone()])),
        };
        converted.ok_or_else(|| failed(&value))
    }
}

/// Integral part of a numeric value, truncating fractions.
fn integral_of(value: &FieldValue) -> Option<i64> {
    match value {
        FieldValue::Float(f) => f64::from(*f).trunc().to_i64(),
        FieldValue::Double(f) => f.trunc().to_i64(),
        FieldValue::Decimal(d) => d.trunc().to_i64(),
        FieldValue::Boolean(b) => Some(*b as i64),
        other => other.as_i64(),
    }
}

/// Parse an even-length hexadecimal string.
fn parse_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

/// Decimal from f64 for callers that have already ruled out NaN and infinity.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    value
        .to_string()
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

/// Accept either a chrono format or a Java-style pattern and return a
/// validated chrono format.
fn normalize_format(format: &str) -> SqlResult<String> {
    let chrono_format = if format.contains('%') {
        format.to_string()
    } else {
        java_pattern_to_chrono(format)?
    };
    if StrftimeItems::new(&chrono_format).any(|item| matches!(item, Item::Error)) {
        return Err(SqlError::configuration_error(format!(
            "Invalid date/time format '{}'",
            format
        )));
    }
    Ok(chrono_format)
}

/// Translate `yyyy-MM-dd HH:mm:ss.SSS` style patterns to chrono.
fn java_pattern_to_chrono(pattern: &str) -> SqlResult<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // quoted literal text, '' is a literal quote
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            out.push(c);
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        let translated = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) | ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('H', _) => "%H",
            ('h', _) => "%I",
            ('m', _) => "%M",
            ('s', _) => "%S",
            ('S', 1..=3) => "%3f",
            ('S', 6) => "%6f",
            ('S', 9) => "%9f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            _ => {
                return Err(SqlError::configuration_error(format!(
                    "Unsupported pattern letter '{}' in format '{}'",
                    c, pattern
                )))
            }
        };
        out.push_str(translated);
        i += run;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_patterns_translate() {
        assert_eq!(java_pattern_to_chrono("yyyy-MM-dd").unwrap(), "%Y-%m-%d");
        assert_eq!(
            java_pattern_to_chrono("dd.MM.yy HH:mm:ss.SSS").unwrap(),
            "%d.%m.%y %H:%M:%S.%3f"
        );
        assert_eq!(java_pattern_to_chrono("HH'h'mm").unwrap(), "%Hh%M");
        assert!(java_pattern_to_chrono("yyyy-QQ").is_err());
    }

    #[test]
    fn test_invalid_chrono_format_is_configuration_error() {
        let err = TypeConverter::new(Some("%Y-%Q"), None, None).unwrap_err();
        assert!(matches!(err, SqlError::ConfigurationError { .. }));
    }

    #[test]
    fn test_parse_failures_are_null() {
        let conv = TypeConverter::default();
        assert_eq!(conv.parse_typed("abc", DataType::Integer), None);
        assert_eq!(conv.parse_typed("", DataType::Date), None);
        assert_eq!(
            conv.parse_typed("", DataType::String),
            Some(FieldValue::String(String::new()))
        );
        assert_eq!(conv.parse_typed("maybe", DataType::Boolean), None);
        assert_eq!(conv.parse_typed("abc", DataType::Bytes), None);
    }

    #[test]
    fn test_infer_order() {
        let conv = TypeConverter::default();
        assert_eq!(conv.infer(&["true", "false"]), DataType::Boolean);
        assert_eq!(conv.infer(&["1", "-20"]), DataType::Integer);
        assert_eq!(conv.infer(&["1", "9999999999"]), DataType::Long);
        assert_eq!(conv.infer(&["1.5"]), DataType::Double);
        assert_eq!(conv.infer(&["0aff"]), DataType::Bytes);
        assert_eq!(conv.infer(&["1.50"]), DataType::Decimal);
        assert_eq!(conv.infer(&["2024-01-02 10:30:00"]), DataType::Timestamp);
        assert_eq!(conv.infer(&["2024-01-02"]), DataType::Date);
        assert_eq!(conv.infer(&["10:30:00"]), DataType::Time);
        assert_eq!(conv.infer(&["hello"]), DataType::String);
        assert_eq!(conv.infer(&["", ""]), DataType::String);
        assert_eq!(conv.infer(&["01"]), DataType::Bytes);
    }

    #[test]
    fn test_temporal_round_trip_with_custom_formats() {
        let conv = TypeConverter::new(Some("dd/MM/yyyy"), Some("HH.mm"), Some("yyyy-MM-dd'T'HH:mm")).unwrap();
        for (raw, ty) in [
            ("31/12/2023", DataType::Date),
            ("07.45", DataType::Time),
            ("2023-12-31T07:45", DataType::Timestamp),
        ] {
            let parsed = conv.parse_typed(raw, ty).unwrap();
            let formatted = conv.format(&parsed);
            assert_eq!(formatted, raw);
            assert_eq!(conv.parse_typed(&formatted, ty), Some(parsed));
        }
    }

    #[test]
    fn test_coerce() {
        let conv = TypeConverter::default();
        assert_eq!(
            conv.coerce(FieldValue::String("42".into()), DataType::Long).unwrap(),
            FieldValue::Long(42)
        );
        assert_eq!(
            conv.coerce(FieldValue::Double(2.9), DataType::Integer).unwrap(),
            FieldValue::Integer(2)
        );
        assert!(conv
            .coerce(FieldValue::String("x".into()), DataType::Integer)
            .is_err());
        assert_eq!(
            conv.coerce(FieldValue::Integer(5), DataType::String).unwrap(),
            FieldValue::String("5".into())
        );
    }
}
