use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Loosely typed value flowing through block expressions and variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Numeric view; unparsable text and null read as 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(flag) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) if n.is_finite() => *n,
            Value::Number(_) => 0.0,
            Value::Text(text) => parse_number(text).unwrap_or(0.0),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(text) => {
                let trimmed = text.trim();
                !(trimmed.is_empty() || trimmed == "0" || trimmed.eq_ignore_ascii_case("false"))
            }
        }
    }

    pub fn as_text(&self) -> String {
        self.to_string()
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(_) | Value::Null => None,
            Value::Text(text) => parse_number(text),
        }
    }

    /// Equality used by the `=` comparison block: numeric when both sides parse as
    /// numbers, otherwise case-insensitive text comparison.
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }

    pub fn compare(&self, other: &Value) -> Ordering {
        if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => self.as_text().to_lowercase().cmp(&other.as_text().to_lowercase()),
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_compares_as_number() {
        assert!(Value::text("10").loose_eq(&Value::Number(10.0)));
        assert_eq!(Value::text("9").compare(&Value::text("10")), Ordering::Less);
    }

    #[test]
    fn text_equality_ignores_case() {
        assert!(Value::text("Apple").loose_eq(&Value::text("apple")));
        assert!(!Value::text("apple").loose_eq(&Value::text("pear")));
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(Value::Number(2.0).to_string(), "2");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn truthiness_follows_text_rules() {
        assert!(!Value::text("false").as_bool());
        assert!(!Value::text("0").as_bool());
        assert!(Value::text("yes").as_bool());
        assert_eq!(Value::text("abc").as_number(), 0.0);
    }
}
