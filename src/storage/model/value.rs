use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One result row keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// A single value returned by the metric source.
///
/// The server reports most status counters as text; [`Value::from_text`]
/// classifies them once at capture time so collectors can match on the
/// variant instead of re-parsing strings.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Time(DateTime<Utc>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Classifies raw counter text: integer first, then finite float, else text.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return Value::Int(v);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Float(v),
            _ => Value::Text(raw.to_string()),
        }
    }

    /// Numeric view of the value. Text is accepted when it parses as a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) if v.is_finite() => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.is_finite() => Some(*v as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Value::Map(m) => write!(f, "{{{} fields}}", m.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_classifies_numbers() {
        assert_eq!(Value::from_text("1500"), Value::Int(1500));
        assert_eq!(Value::from_text(" 42 "), Value::Int(42));
        assert_eq!(Value::from_text("0.25"), Value::Float(0.25));
        assert_eq!(Value::from_text("ON"), Value::Text("ON".to_string()));
        assert_eq!(Value::from_text("NaN"), Value::Text("NaN".to_string()));
    }

    #[test]
    fn as_f64_ignores_non_numeric() {
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::Text("3.5".into()).as_f64(), Some(3.5));
        assert_eq!(Value::Text("not started".into()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_f64(), None);
    }

    #[test]
    fn null_serializes_as_json_null() {
        let json = serde_json::to_string(&Value::Null).unwrap();
        assert_eq!(json, "null");
        let json = serde_json::to_string(&Value::Int(3)).unwrap();
        assert_eq!(json, "3");
    }
}
