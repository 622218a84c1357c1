//! Cell values and their types.
//!
//! Blocks hold `Value` cells; `ColMeta` declares each column's `DataType`.
//! Deserialization of untagged values maps integers to `Int`; loaders
//! coerce to the column's declared type afterwards.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Time,
    Bool,
    Int,
    UInt,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Time(Time),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::UInt(_) => DataType::UInt,
            Value::Float(_) => DataType::Float,
            Value::Str(_) => DataType::String,
            Value::Time(_) => DataType::Time,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Value::Time(t) => Some(*t),
            Value::Int(v) => Some(Time(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Rough heap footprint, for allocator accounting.
    pub fn size_bytes(&self) -> usize {
        match self {
            Value::Str(s) => 8 + s.len(),
            _ => 8,
        }
    }

    /// Reinterpret under a declared column type. Used when loading untagged
    /// JSON, where every integer arrives as `Int`.
    pub fn coerce(self, to: DataType) -> Value {
        match (to, self) {
            (DataType::Time, Value::Int(v)) => Value::Time(Time(v)),
            (DataType::UInt, Value::Int(v)) if v >= 0 => Value::UInt(v as u64),
            (DataType::Float, Value::Int(v)) => Value::Float(v as f64),
            (_, v) => v,
        }
    }
}

/// Total order over values: by type first, then by value. NaN sorts last
/// among floats.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    use Value::*;
    match (a, b) {
        (Bool(x), Bool(y)) => x.cmp(y),
        (Int(x), Int(y)) => x.cmp(y),
        (UInt(x), UInt(y)) => x.cmp(y),
        (Float(x), Float(y)) => {
            if x.is_nan() && y.is_nan() {
                Ordering::Equal
            } else if x.is_nan() {
                Ordering::Greater
            } else if y.is_nan() {
                Ordering::Less
            } else {
                x.partial_cmp(y).unwrap_or(Ordering::Equal)
            }
        }
        (Str(x), Str(y)) => x.cmp(y),
        (Time(x), Time(y)) => x.cmp(y),
        _ => type_order(a).cmp(&type_order(b)),
    }
}

fn type_order(v: &Value) -> u8 {
    match v {
        Value::Bool(_) => 0,
        Value::Int(_) => 1,
        Value::UInt(_) => 2,
        Value::Float(_) => 3,
        Value::Str(_) => 4,
        Value::Time(_) => 5,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_follows_declared_type() {
        assert_eq!(Value::Int(5).coerce(DataType::Time), Value::Time(Time(5)));
        assert_eq!(Value::Int(5).coerce(DataType::Float), Value::Float(5.0));
        assert_eq!(Value::Int(-5).coerce(DataType::UInt), Value::Int(-5));
    }

    #[test]
    fn nan_sorts_last() {
        let mut vs = vec![Value::Float(f64::NAN), Value::Float(1.0), Value::Float(0.5)];
        vs.sort_by(value_cmp);
        assert_eq!(vs[0], Value::Float(0.5));
        assert_eq!(vs[1], Value::Float(1.0));
        assert!(matches!(vs[2], Value::Float(v) if v.is_nan()));
    }
}
