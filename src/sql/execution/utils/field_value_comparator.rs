/// Field Value Comparison Utilities
///
/// Ordering and equality between FieldValue instances with the promotion rules
/// of the engine. A pair that has no defined ordering yields `None`, which
/// callers treat as three-valued unknown.
use crate::sql::ast::ComparisonOperator;
use crate::sql::execution::convert::TypeConverter;
use crate::sql::execution::types::FieldValue;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

/// Utility class for comparing FieldValue instances
pub struct FieldValueComparator;

impl FieldValueComparator {
    /// Compare two non-null values.
    ///
    /// - numbers compare as exact decimals, or as f64 when a float is involved
    /// - a Date compared with a Timestamp is taken at midnight
    /// - text compared with a temporal value is parsed with `converter`
    /// - text compared with a number is parsed as a decimal
    /// - text compared with a boolean accepts `true`/`false`
    pub fn compare(
        left: &FieldValue,
        right: &FieldValue,
        converter: &TypeConverter,
    ) -> Option<Ordering> {
        use FieldValue::*;

        if left.is_numeric() && right.is_numeric() {
            return Self::compare_numeric(left, right);
        }

        match (left, right) {
            (String(a), String(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Time(a), Time(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Date(a), Timestamp(b)) => Some(a.and_time(NaiveTime::MIN).cmp(b)),
            (Timestamp(a), Date(b)) => Some(a.cmp(&b.and_time(NaiveTime::MIN))),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (Array(a), Array(b)) => Self::compare_arrays(a, b, converter),
            (String(s), other) => {
                let promoted = Self::promote_text(s, other, converter)?;
                Self::compare(&promoted, other, converter)
            }
            (other, String(s)) => {
                let promoted = Self::promote_text(s, other, converter)?;
                Self::compare(other, &promoted, converter)
            }
            _ => None,
        }
    }

    /// Equality under the same promotion rules; `None` when not comparable.
    pub fn values_equal(
        left: &FieldValue,
        right: &FieldValue,
        converter: &TypeConverter,
    ) -> Option<bool> {
        Self::compare(left, right, converter).map(|o| o == Ordering::Equal)
    }

    /// Apply a comparison operator with three-valued semantics: a NULL operand
    /// or an incomparable pair yields `None`.
    pub fn compare_with_operator(
        left: Option<&FieldValue>,
        right: Option<&FieldValue>,
        op: ComparisonOperator,
        converter: &TypeConverter,
    ) -> Option<bool> {
        let ordering = Self::compare(left?, right?, converter)?;
        Some(match op {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
            ComparisonOperator::LessThan => ordering == Ordering::Less,
            ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
            ComparisonOperator::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        })
    }

    /// Total order used by sorting and MIN/MAX. NULL sorts after every value;
    /// incomparable pairs fall back to comparing their type names so the
    /// order stays consistent.
    pub fn sort_order(
        left: Option<&FieldValue>,
        right: Option<&FieldValue>,
        converter: &TypeConverter,
    ) -> Ordering {
        match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => Self::compare(a, b, converter)
                .unwrap_or_else(|| a.type_name().cmp(b.type_name())),
        }
    }

    fn compare_numeric(left: &FieldValue, right: &FieldValue) -> Option<Ordering> {
        if left.is_integral() && right.is_integral() {
            return Some(left.as_i64()?.cmp(&right.as_i64()?));
        }
        if left.is_floating() || right.is_floating() {
            return left.to_f64()?.partial_cmp(&right.to_f64()?);
        }
        Some(left.to_decimal()?.cmp(&right.to_decimal()?))
    }

    fn compare_arrays(
        left: &[FieldValue],
        right: &[FieldValue],
        converter: &TypeConverter,
    ) -> Option<Ordering> {
        for (a, b) in left.iter().zip(right.iter()) {
            match Self::compare(a, b, converter)? {
                Ordering::Equal => continue,
                other => return Some(other),
            }
        }
        Some(left.len().cmp(&right.len()))
    }

    /// Parse text into the type of `target` for comparison.
    fn promote_text(
        text: &str,
        target: &FieldValue,
        converter: &TypeConverter,
    ) -> Option<FieldValue> {
        match target {
            FieldValue::Date(_) => converter.parse_date(text).map(FieldValue::Date),
            FieldValue::Time(_) => converter.parse_time(text).map(FieldValue::Time),
            FieldValue::Timestamp(_) => converter
                .parse_timestamp(text)
                .map(FieldValue::Timestamp)
                .or_else(|| {
                    converter
                        .parse_date(text)
                        .map(|d| FieldValue::Timestamp(d.and_time(NaiveTime::MIN)))
                }),
            FieldValue::Boolean(_) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    Some(FieldValue::Boolean(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Some(FieldValue::Boolean(false))
                } else {
                    None
                }
            }
            v if v.is_floating() => text.trim().parse::<f64>().ok().map(FieldValue::Double),
            v if v.is_numeric() => Decimal::from_str(text.trim())
                .or_else(|_| Decimal::from_scientific(text.trim()))
                .ok()
                .map(FieldValue::Decimal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn conv() -> TypeConverter {
        TypeConverter::default()
    }

    #[test]
    fn test_mixed_numeric_ordering() {
        let c = conv();
        assert_eq!(
            FieldValueComparator::compare(&FieldValue::Integer(2), &FieldValue::Long(10), &c),
            Some(Ordering::Less)
        );
        assert_eq!(
            FieldValueComparator::compare(
                &FieldValue::Decimal(Decimal::new(15, 1)),
                &FieldValue::Double(1.5),
                &c
            ),
            Some(Ordering::Equal)
        );
        assert_eq!(
            FieldValueComparator::compare(
                &FieldValue::Double(f64::NAN),
                &FieldValue::Integer(1),
                &c
            ),
            None
        );
    }

    #[test]
    fn test_text_promotes_to_temporal() {
        let c = conv();
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(
            FieldValueComparator::compare(&FieldValue::String("2024-03-01".into()), &date, &c),
            Some(Ordering::Equal)
        );
        assert_eq!(
            FieldValueComparator::compare(&date, &FieldValue::String("not a date".into()), &c),
            None
        );
    }

    #[test]
    fn test_date_against_timestamp_uses_midnight() {
        let c = conv();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let date = FieldValue::Date(day);
        let noon = FieldValue::Timestamp(day.and_hms_opt(12, 0, 0).unwrap());
        assert_eq!(
            FieldValueComparator::compare(&date, &noon, &c),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_null_operand_is_unknown() {
        let c = conv();
        let one = FieldValue::Integer(1);
        assert_eq!(
            FieldValueComparator::compare_with_operator(
                None,
                Some(&one),
                ComparisonOperator::Equal,
                &c
            ),
            None
        );
        assert_eq!(
            FieldValueComparator::compare_with_operator(
                Some(&one),
                Some(&FieldValue::String("1".into())),
                ComparisonOperator::Equal,
                &c
            ),
            Some(true)
        );
    }

    #[test]
    fn test_sort_order_puts_null_last() {
        let c = conv();
        let one = FieldValue::Integer(1);
        assert_eq!(
            FieldValueComparator::sort_order(None, Some(&one), &c),
            Ordering::Greater
        );
        assert_eq!(FieldValueComparator::sort_order(None, None, &c), Ordering::Equal);
    }
}
