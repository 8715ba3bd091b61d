//! Domain values.

use crate::plan::ObjectId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A single value a variable can take.
///
/// Numbers are ordered with [`f64::total_cmp`]; constructors normalise
/// `-0.0` to `0.0` so that equality and ordering agree.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Symbol(Arc<str>),
    Object(ObjectId),
}

impl Value {
    /// Creates a numeric value.
    pub fn number(x: f64) -> Self {
        Value::Number(if x == 0.0 { 0.0 } else { x })
    }

    /// Creates a symbolic value.
    pub fn symbol(s: &str) -> Self {
        Value::Symbol(Arc::from(s))
    }

    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::Symbol(_) => 2,
            Value::Object(_) => 3,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Number(x) => x.to_bits().hash(state),
            Value::Symbol(s) => s.hash(state),
            Value::Object(id) => id.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(x) => write!(f, "{x}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Object(id) => write!(f, "object{id:?}"),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::number(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::number(x as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::symbol(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_zero_normalised() {
        assert_eq!(Value::number(-0.0), Value::number(0.0));
        assert_eq!(Value::from(0i64), Value::from(-0.0));
    }

    #[test]
    fn test_ordering_across_kinds() {
        let mut values = vec![
            Value::symbol("b"),
            Value::number(3.0),
            Value::Bool(true),
            Value::number(-1.5),
            Value::symbol("a"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Bool(true),
                Value::number(-1.5),
                Value::number(3.0),
                Value::symbol("a"),
                Value::symbol("b"),
            ]
        );
    }
}
