use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Runtime value in the Spark language.
///
/// Values are the only data that can live on the operand stack, in globals,
/// or in a chunk's constant pool. Booleans are produced by comparisons and by
/// `btn`; `Nil` is what a function returns when it falls off its end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit floating-point number. All numeric literals are floats.
    Number(f64),

    /// UTF-8 string value.
    Str(String),

    /// Boolean value.
    Bool(bool),

    /// Absence of a value.
    Nil,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
        }
    }

    /// Falsy values: `0`, `""`, `false` and `nil`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Nil => false,
        }
    }

    /// Numeric view used by arithmetic: numbers, and booleans as 1/0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Permissive numeric view used when syscall checking is off: strings
    /// parse if they can, anything else is 0.
    pub fn to_number_lossy(&self) -> f64 {
        match self {
            Value::Str(s) => s.trim().parse().unwrap_or(0.0),
            other => other.as_number().unwrap_or(0.0),
        }
    }

    /// `==` semantics: never fails, mixed types are unequal except
    /// booleans against numbers, which compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Ordering for `< <= > >=`; `None` when the operands are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_number()?;
                let b = other.as_number()?;
                a.partial_cmp(&b)
            }
        }
    }
}

impl std::fmt::Display for Value {
    /// Formats a value the way string `+` and `log` show it.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::Str("0".into()).is_truthy());
        assert!(Value::Bool(true).is_truthy());
    }

    #[test]
    fn test_display_drops_integral_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Nil.to_string(), "nil");
    }

    #[test]
    fn test_loose_eq() {
        assert!(Value::Number(1.0).loose_eq(&Value::Bool(true)));
        assert!(!Value::Number(1.0).loose_eq(&Value::Str("1".into())));
        assert!(Value::Str("a".into()).loose_eq(&Value::Str("a".into())));
        assert!(Value::Nil.loose_eq(&Value::Nil));
        assert!(!Value::Nil.loose_eq(&Value::Number(0.0)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            Value::Number(1.0).compare(&Value::Number(2.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Str("b".into()).compare(&Value::Str("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Str("1".into()).compare(&Value::Number(1.0)), None);
        assert_eq!(Value::Nil.compare(&Value::Nil), None);
    }

    #[test]
    fn test_lossy_number() {
        assert_eq!(Value::Str(" 12 ".into()).to_number_lossy(), 12.0);
        assert_eq!(Value::Str("x".into()).to_number_lossy(), 0.0);
        assert_eq!(Value::Nil.to_number_lossy(), 0.0);
    }
}
