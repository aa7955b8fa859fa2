//! Cell values as they come out of a spreadsheet.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One cell. Spreadsheet cells are either text, a number, or empty; booleans
/// and dates are carried as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Scalar {
    Text(String),
    Number(f64),
    Missing,
}

impl Scalar {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The string used to look this value up in color assignments and filter
    /// sets. `None` for missing cells, which never match anything.
    ///
    /// Numbers with no fractional part render without a trailing `.0` so that
    /// `3.0` read from an xlsx file matches the `"3"` key a settings file
    /// stores.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Missing => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse a raw CSV field: empty is missing, anything `f64` accepts is a
    /// number, the rest is text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Total order used to present distinct values: numbers first in numeric
    /// order, then text, then missing.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Number(_), _) => Ordering::Less,
            (_, Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Text(_), Self::Missing) => Ordering::Less,
            (Self::Missing, Self::Text(_)) => Ordering::Greater,
            (Self::Missing, Self::Missing) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Missing => Ok(()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Number(n) => n.as_f64().map_or(Self::Missing, Self::Number),
            Value::String(s) => Self::Text(s),
            Value::Bool(b) => Self::Text(b.to_string()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => Value::String(s),
            Scalar::Number(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            Scalar::Missing => Value::Null,
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Scalar;

    #[test]
    fn integral_numbers_key_without_fraction() {
        assert_eq!(Scalar::Number(3.0).key().as_deref(), Some("3"));
        assert_eq!(Scalar::Number(-6.25).key().as_deref(), Some("-6.25"));
        assert_eq!(Scalar::Missing.key(), None);
    }

    #[test]
    fn infer_splits_numbers_text_and_blanks() {
        assert_eq!(Scalar::infer("  "), Scalar::Missing);
        assert_eq!(Scalar::infer("106.8"), Scalar::Number(106.8));
        assert_eq!(Scalar::infer("Jakarta"), Scalar::Text("Jakarta".into()));
        assert_eq!(Scalar::infer("NaN"), Scalar::Text("NaN".into()));
    }

    #[test]
    fn json_null_and_bool_map_to_missing_and_text() {
        let values: Vec<Scalar> = serde_json::from_str(r#"[null, true, "x", 2]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Scalar::Missing,
                Scalar::Text("true".into()),
                Scalar::Text("x".into()),
                Scalar::Number(2.0),
            ]
        );
    }

    #[test]
    fn display_order_puts_numbers_before_text() {
        let mut values = vec![
            Scalar::Text("b".into()),
            Scalar::Number(10.0),
            Scalar::Text("a".into()),
            Scalar::Number(2.0),
        ];
        values.sort_by(Scalar::display_cmp);
        assert_eq!(
            values,
            vec![
                Scalar::Number(2.0),
                Scalar::Number(10.0),
                Scalar::Text("a".into()),
                Scalar::Text("b".into()),
            ]
        );
    }
}
