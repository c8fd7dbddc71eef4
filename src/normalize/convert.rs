//! Type coercion of matched values.

use thiserror::Error;

use crate::model::MatchedValue;
use crate::schema::ValueKind;

/// A value that could not be coerced to its declared type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert '{value}' to {kind}: {reason}")]
pub struct ConversionError {
    /// The original text
    pub value: String,
    /// The declared type
    pub kind: ValueKind,
    /// Why parsing failed
    pub reason: String,
}

impl ConversionError {
    fn new(value: &str, kind: &ValueKind, reason: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            kind: kind.clone(),
            reason: reason.into(),
        }
    }
}

/// A conversion failure attached to the field it happened in.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFailure {
    /// Dotted path of the field within the record
    pub field: String,
    /// What went wrong
    pub error: ConversionError,
}

/// Parse a finite float, ignoring surrounding whitespace.
pub(crate) fn parse_finite(text: &str) -> Result<f64, String> {
    let n: f64 = text.trim().parse().map_err(|e| format!("{}", e))?;
    if n.is_finite() {
        Ok(n)
    } else {
        Err("not a finite number".to_string())
    }
}

/// Coerce a matched text value to its declared type.
///
/// | kind | rule |
/// |---|---|
/// | `float_dollar` | keep digits, `.` and `-`; parse |
/// | `float` | drop `,`; parse |
/// | `int` | drop `,`; parse as float; truncate toward zero |
/// | `float_percentage` | strip trailing `%`; parse; divide by 100 |
/// | `date`, other | unchanged text |
pub fn convert_value(value: &str, kind: &ValueKind) -> Result<MatchedValue, ConversionError> {
    let fail = |reason: String| ConversionError::new(value, kind, reason);

    match kind {
        ValueKind::FloatDollar => {
            let digits: String = value
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            parse_finite(&digits).map(MatchedValue::Number).map_err(fail)
        }
        ValueKind::Float => parse_finite(&value.replace(',', ""))
            .map(MatchedValue::Number)
            .map_err(fail),
        ValueKind::Int => {
            let n = parse_finite(&value.replace(',', "")).map_err(fail)?;
            let truncated = n.trunc();
            // i64::MAX rounds up to 2^63 as f64, which is already out of range
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(ConversionError::new(value, kind, "out of integer range"));
            }
            Ok(MatchedValue::Integer(truncated as i64))
        }
        ValueKind::FloatPercentage => parse_finite(value.trim_end_matches('%'))
            .map(|n| MatchedValue::Number(n / 100.0))
            .map_err(fail),
        ValueKind::Date | ValueKind::Other(_) => Ok(MatchedValue::Text(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(value: &str, tag: &str) -> Result<MatchedValue, ConversionError> {
        convert_value(value, &ValueKind::from_tag(tag))
    }

    #[test]
    fn test_float_dollar() {
        assert_eq!(convert("$1,234.56", "float_dollar"), Ok(MatchedValue::Number(1234.56)));
        assert_eq!(convert("USD -12.50", "float_dollar"), Ok(MatchedValue::Number(-12.5)));
        assert!(convert("$", "float_dollar").is_err());
    }

    #[test]
    fn test_float() {
        assert_eq!(convert("1,234.5", "float"), Ok(MatchedValue::Number(1234.5)));
        assert_eq!(convert(" 7 ", "float"), Ok(MatchedValue::Number(7.0)));
        assert!(convert("12 MCF", "float").is_err());
    }

    #[test]
    fn test_int_truncates() {
        assert_eq!(convert("1,234", "int"), Ok(MatchedValue::Integer(1234)));
        assert_eq!(convert("30.9", "int"), Ok(MatchedValue::Integer(30)));
        assert_eq!(convert("-2.7", "int"), Ok(MatchedValue::Integer(-2)));
        assert!(convert("thirty", "int").is_err());
    }

    #[test]
    fn test_int_range_bounds() {
        let err = convert("9223372036854775808", "int").unwrap_err();
        assert_eq!(err.kind, ValueKind::Int);
        assert!(convert("1e19", "int").is_err());
        assert_eq!(
            convert("-9223372036854775808", "int"),
            Ok(MatchedValue::Integer(i64::MIN))
        );
    }

    #[test]
    fn test_percentage() {
        assert_eq!(convert("12.5%", "float_percentage"), Ok(MatchedValue::Number(0.125)));
        assert_eq!(convert("50", "float_percentage"), Ok(MatchedValue::Number(0.5)));
        assert!(convert("%", "float_percentage").is_err());
    }

    #[test]
    fn test_passthrough_kinds() {
        assert_eq!(convert("Jan 15, 2023", "date"), Ok(MatchedValue::from("Jan 15, 2023")));
        assert_eq!(convert("Acme", "string"), Ok(MatchedValue::from("Acme")));
        assert_eq!(convert("Acme", ""), Ok(MatchedValue::from("Acme")));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = convert("inf", "float").unwrap_err();
        assert_eq!(err.value, "inf");
        assert_eq!(err.kind, ValueKind::Float);
        assert!(convert("NaN", "float").is_err());
    }

    #[test]
    fn test_error_display() {
        let err = convert("abc", "int").unwrap_err();
        assert!(err.to_string().starts_with("cannot convert 'abc' to int"));
    }
}
