//! Semantic column types and value coercion

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::error::SchemaError;
use crate::source::Value;

/// Largest decimal precision accepted by the target stores
pub const MAX_DECIMAL_PRECISION: u32 = 38;

/// Largest scale a coerced `rust_decimal::Decimal` can carry
pub const MAX_DECIMAL_SCALE: u32 = 28;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Semantic type of a target column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SemanticType {
    /// 64-bit signed integer
    Integer,
    /// Fixed-point decimal
    Decimal { precision: u32, scale: u32 },
    /// Date and time without zone
    Timestamp,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Character data, optionally length-limited
    Text { max_len: Option<u32> },
}

impl SemanticType {
    /// DDL type name used when creating the target container
    pub fn ddl(&self) -> String {
        match self {
            SemanticType::Integer => "BIGINT".to_string(),
            SemanticType::Decimal { precision, scale } => format!("DECIMAL({precision},{scale})"),
            SemanticType::Timestamp => "TIMESTAMP".to_string(),
            SemanticType::Date => "DATE".to_string(),
            SemanticType::Time => "TIME".to_string(),
            SemanticType::Text { .. } => "VARCHAR".to_string(),
        }
    }

    /// Whether an existing store column type can hold values of this type
    pub fn accepts_store_type(&self, store_type: &str) -> bool {
        let normalized: String = store_type
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        match self {
            SemanticType::Integer => matches!(
                normalized.as_str(),
                "BIGINT" | "INTEGER" | "INT" | "INT8" | "INT4" | "HUGEINT" | "LONG"
            ),
            SemanticType::Decimal { .. } => normalized == self.ddl(),
            SemanticType::Timestamp => {
                matches!(normalized.as_str(), "TIMESTAMP" | "DATETIME" | "TIMESTAMP_US")
            }
            SemanticType::Date => normalized == "DATE",
            SemanticType::Time => normalized == "TIME",
            SemanticType::Text { .. } => {
                normalized == "VARCHAR"
                    || normalized == "TEXT"
                    || normalized == "STRING"
                    || normalized.starts_with("VARCHAR(")
            }
        }
    }

    /// Coerce a value to this type
    ///
    /// `format` is a `chrono` format string tried first for temporal types.
    /// Null handling is the caller's concern; a null input returns null.
    pub fn coerce(&self, value: &Value, format: Option<&str>) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            SemanticType::Integer => coerce_integer(value),
            SemanticType::Decimal { precision, scale } => {
                coerce_decimal(value, *precision, *scale).map(Value::Decimal)
            }
            SemanticType::Timestamp => coerce_timestamp(value, format).map(Value::Timestamp),
            SemanticType::Date => coerce_date(value, format).map(Value::Date),
            SemanticType::Time => coerce_time(value, format).map(Value::Time),
            SemanticType::Text { max_len } => {
                let text = value.to_string();
                if let Some(max) = max_len {
                    let len = text.chars().count();
                    if len > *max as usize {
                        return Err(format!("length {len} exceeds limit of {max}"));
                    }
                }
                Ok(Value::Text(text))
            }
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Integer => write!(f, "integer"),
            SemanticType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            SemanticType::Timestamp => write!(f, "timestamp"),
            SemanticType::Date => write!(f, "date"),
            SemanticType::Time => write!(f, "time"),
            SemanticType::Text { max_len: Some(n) } => write!(f, "varchar({n})"),
            SemanticType::Text { max_len: None } => write!(f, "text"),
        }
    }
}

impl FromStr for SemanticType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (base, args) = match lower.split_once('(') {
            Some((base, rest)) => {
                let args = rest
                    .strip_suffix(')')
                    .ok_or_else(|| SchemaError::InvalidType(s.to_string()))?;
                (base.trim(), Some(args))
            }
            None => (lower.as_str(), None),
        };

        let parse_arg = |arg: &str| -> Result<u32, SchemaError> {
            arg.trim()
                .parse::<u32>()
                .map_err(|_| SchemaError::InvalidType(s.to_string()))
        };

        match (base, args) {
            ("integer" | "int" | "bigint", None) => Ok(SemanticType::Integer),
            ("decimal" | "numeric", None) => Ok(SemanticType::Decimal {
                precision: 18,
                scale: 3,
            }),
            ("decimal" | "numeric", Some(args)) => {
                let (precision, scale) = match args.split_once(',') {
                    Some((p, sc)) => (parse_arg(p)?, parse_arg(sc)?),
                    None => (parse_arg(args)?, 0),
                };
                if precision == 0
                    || precision > MAX_DECIMAL_PRECISION
                    || scale > precision
                    || scale > MAX_DECIMAL_SCALE
                {
                    return Err(SchemaError::InvalidType(s.to_string()));
                }
                Ok(SemanticType::Decimal { precision, scale })
            }
            ("timestamp" | "datetime", None) => Ok(SemanticType::Timestamp),
            ("date", None) => Ok(SemanticType::Date),
            ("time", None) => Ok(SemanticType::Time),
            ("text" | "string", None) | ("varchar", None) => {
                Ok(SemanticType::Text { max_len: None })
            }
            ("varchar" | "string", Some(arg)) => Ok(SemanticType::Text {
                max_len: Some(parse_arg(arg)?),
            }),
            _ => Err(SchemaError::InvalidType(s.to_string())),
        }
    }
}

impl TryFrom<String> for SemanticType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemanticType> for String {
    fn from(value: SemanticType) -> Self {
        value.to_string()
    }
}

fn parse_decimal_text(text: &str) -> Result<Decimal, String> {
    let text = text.trim();
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };
    parsed.map_err(|e| e.to_string())
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    let decimal = match value {
        Value::Integer(n) => return Ok(Value::Integer(*n)),
        Value::Decimal(d) => *d,
        Value::Text(s) => {
            if let Ok(n) = s.trim().parse::<i64>() {
                return Ok(Value::Integer(n));
            }
            parse_decimal_text(s)?
        }
        other => return Err(format!("cannot convert {} to integer", other.kind())),
    };

    // Exports often render integer columns as "12.0"
    if !decimal.fract().is_zero() {
        return Err("has a fractional part".to_string());
    }
    decimal
        .trunc()
        .to_i64()
        .map(Value::Integer)
        .ok_or_else(|| "out of range for a 64-bit integer".to_string())
}

fn coerce_decimal(value: &Value, precision: u32, scale: u32) -> Result<Decimal, String> {
    let decimal = match value {
        Value::Integer(n) => Decimal::from(*n),
        Value::Decimal(d) => *d,
        Value::Text(s) => parse_decimal_text(s)?,
        other => return Err(format!("cannot convert {} to decimal", other.kind())),
    };

    let normalized = decimal.normalize();
    if normalized.scale() > scale {
        return Err(format!("more than {scale} fractional digits"));
    }

    let int_part = normalized.abs().trunc();
    let int_digits = if int_part.is_zero() {
        0
    } else {
        int_part.to_string().len() as u32
    };
    if int_digits > precision.saturating_sub(scale) {
        return Err(format!("exceeds precision {precision} with scale {scale}"));
    }

    let mut rescaled = normalized;
    rescaled.rescale(scale);
    Ok(rescaled)
}

fn coerce_timestamp(value: &Value, format: Option<&str>) -> Result<NaiveDateTime, String> {
    let text = match value {
        Value::Timestamp(ts) => return Ok(*ts),
        Value::Date(d) => return d.and_hms_opt(0, 0, 0).ok_or_else(|| "invalid date".to_string()),
        Value::Text(s) => s.trim(),
        other => return Err(format!("cannot convert {} to timestamp", other.kind())),
    };

    if let Some(fmt) = format {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(ts);
        }
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            if let Some(ts) = d.and_hms_opt(0, 0, 0) {
                return Ok(ts);
            }
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(ts) = d.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }

    Err(match format {
        Some(fmt) => format!("does not match '{fmt}' or ISO-8601"),
        None => "is not an ISO-8601 timestamp".to_string(),
    })
}

fn coerce_date(value: &Value, format: Option<&str>) -> Result<NaiveDate, String> {
    let text = match value {
        Value::Date(d) => return Ok(*d),
        Value::Timestamp(ts) if ts.date().and_hms_opt(0, 0, 0) == Some(*ts) => {
            return Ok(ts.date());
        }
        Value::Text(s) => s.trim(),
        other => return Err(format!("cannot convert {} to date", other.kind())),
    };

    if let Some(fmt) = format {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Ok(d);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| match format {
        Some(fmt) => format!("does not match '{fmt}' or YYYY-MM-DD"),
        None => "is not a YYYY-MM-DD date".to_string(),
    })
}

fn coerce_time(value: &Value, format: Option<&str>) -> Result<NaiveTime, String> {
    let text = match value {
        Value::Time(t) => return Ok(*t),
        Value::Text(s) => s.trim(),
        other => return Err(format!("cannot convert {} to time", other.kind())),
    };

    if let Some(fmt) = format {
        if let Ok(t) = NaiveTime::parse_from_str(text, fmt) {
            return Ok(t);
        }
    }
    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(text, fmt) {
            return Ok(t);
        }
    }
    Err("is not a HH:MM:SS time".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(
            "integer".parse::<SemanticType>().unwrap(),
            SemanticType::Integer
        );
        assert_eq!(
            "DECIMAL(10, 2)".parse::<SemanticType>().unwrap(),
            SemanticType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        assert_eq!(
            "varchar(50)".parse::<SemanticType>().unwrap(),
            SemanticType::Text { max_len: Some(50) }
        );
        assert_eq!(
            "string".parse::<SemanticType>().unwrap(),
            SemanticType::Text { max_len: None }
        );
        assert!("decimal(2,5)".parse::<SemanticType>().is_err());
        assert!("blob".parse::<SemanticType>().is_err());
    }

    #[test]
    fn test_decimal_scale_limited_to_coercible_range() {
        assert!("decimal(38,30)".parse::<SemanticType>().is_err());
        assert!("decimal(29,29)".parse::<SemanticType>().is_err());

        let widest: SemanticType = "decimal(38,28)".parse().unwrap();
        assert_eq!(
            widest,
            SemanticType::Decimal {
                precision: 38,
                scale: MAX_DECIMAL_SCALE
            }
        );
        assert!(widest.coerce(&text("1.5"), None).is_ok());
    }

    #[test]
    fn test_type_name_round_trip_through_display() {
        for name in ["integer", "decimal(10,5)", "timestamp", "date", "time", "varchar(50)"] {
            let ty: SemanticType = name.parse().unwrap();
            assert_eq!(ty.to_string(), name);
        }
    }

    #[test]
    fn test_integer_coercion() {
        let ty = SemanticType::Integer;
        assert_eq!(ty.coerce(&text("42"), None), Ok(Value::Integer(42)));
        assert_eq!(ty.coerce(&text("42.0"), None), Ok(Value::Integer(42)));
        assert!(ty.coerce(&text("42.5"), None).is_err());
        assert!(ty.coerce(&text("abc"), None).is_err());
        assert_eq!(ty.coerce(&Value::Null, None), Ok(Value::Null));
    }

    #[test]
    fn test_decimal_coercion_is_exact() {
        let ty = SemanticType::Decimal {
            precision: 10,
            scale: 2,
        };
        let coerced = ty.coerce(&text("0.1"), None).unwrap();
        assert_eq!(coerced.to_string(), "0.10");

        let coerced = ty.coerce(&text("1234.500"), None).unwrap();
        assert_eq!(coerced.to_string(), "1234.50");

        assert!(ty.coerce(&text("1.005"), None).is_err());
        assert!(ty.coerce(&text("123456789.00"), None).is_err());
        assert_eq!(
            ty.coerce(&Value::Integer(7), None).unwrap().to_string(),
            "7.00"
        );
    }

    #[test]
    fn test_timestamp_coercion() {
        let ty = SemanticType::Timestamp;
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();

        assert_eq!(
            ty.coerce(&text("2024-01-15 10:30:00"), None),
            Ok(Value::Timestamp(expected))
        );
        assert_eq!(
            ty.coerce(&text("2024-01-15T10:30:00Z"), None),
            Ok(Value::Timestamp(expected))
        );
        assert_eq!(
            ty.coerce(&text("15/01/2024 10:30"), Some("%d/%m/%Y %H:%M")),
            Ok(Value::Timestamp(expected))
        );
        assert!(ty.coerce(&text("yesterday"), None).is_err());
    }

    #[test]
    fn test_time_and_date_coercion() {
        assert_eq!(
            SemanticType::Time.coerce(&text("08:15:00"), None),
            Ok(Value::Time(NaiveTime::from_hms_opt(8, 15, 0).unwrap()))
        );
        assert_eq!(
            SemanticType::Date.coerce(&text("2023-12-31"), None),
            Ok(Value::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()))
        );
        assert!(SemanticType::Date.coerce(&text("31.12.2023"), None).is_err());
    }

    #[test]
    fn test_text_length_limit() {
        let ty = SemanticType::Text { max_len: Some(3) };
        assert_eq!(ty.coerce(&text("abc"), None), Ok(text("abc")));
        assert!(ty.coerce(&text("abcd"), None).is_err());
    }

    #[test]
    fn test_store_type_compatibility() {
        let money = SemanticType::Decimal {
            precision: 10,
            scale: 2,
        };
        assert!(money.accepts_store_type("DECIMAL(10,2)"));
        assert!(!money.accepts_store_type("DECIMAL(10,5)"));
        assert!(!money.accepts_store_type("DOUBLE"));
        assert!(SemanticType::Integer.accepts_store_type("INTEGER"));
        assert!(!SemanticType::Integer.accepts_store_type("VARCHAR"));
        assert!(SemanticType::Text { max_len: Some(50) }.accepts_store_type("VARCHAR"));
    }
}
