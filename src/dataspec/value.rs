//! Typed values and the per-type parse/format rules used when materializing
//! propositions from result rows.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared type of a value column or property column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Nominal,
    Number,
    Boolean,
    Date,
}

/// A parsed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nominal(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDateTime),
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot parse '{raw}' as {value_type:?}")]
pub struct ValueParseError {
    pub raw: String,
    pub value_type: ValueType,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d"];

impl ValueType {
    /// Parse a raw cell under this value type. Callers decide the recovery
    /// policy; a single bad cell never aborts a query (the processors record
    /// null and log a warning).
    pub fn parse(&self, raw: &str) -> Result<Value, ValueParseError> {
        let err = || ValueParseError {
            raw: raw.to_string(),
            value_type: *self,
        };
        match self {
            ValueType::Nominal => Ok(Value::Nominal(raw.to_string())),
            ValueType::Number => raw.trim().parse::<f64>().map(Value::Number).map_err(|_| err()),
            ValueType::Boolean => match raw.trim() {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Value::Boolean(true)),
                "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Value::Boolean(false)),
                _ => Err(err()),
            },
            ValueType::Date => parse_date(raw.trim()).map(Value::Date).ok_or_else(err),
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    for fmt in DATE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    // Date-only inputs have no time component to parse.
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nominal(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_and_rejects_garbage() {
        assert_eq!(ValueType::Number.parse("7.5"), Ok(Value::Number(7.5)));
        assert!(ValueType::Number.parse("seven").is_err());
    }

    #[test]
    fn parses_dates_with_and_without_time() {
        assert!(matches!(
            ValueType::Date.parse("2013-04-01 12:30:00"),
            Ok(Value::Date(_))
        ));
        assert!(matches!(ValueType::Date.parse("2013-04-01"), Ok(Value::Date(_))));
        assert!(ValueType::Date.parse("not a date").is_err());
    }

    #[test]
    fn nominal_accepts_anything() {
        assert_eq!(
            ValueType::Nominal.parse("ICD9:250.00"),
            Ok(Value::Nominal("ICD9:250.00".to_string()))
        );
    }
}
