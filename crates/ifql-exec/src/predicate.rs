//! Predicate evaluation over a single row.
//!
//! Used by the in-memory storage reader to honor pushed-down `where`
//! expressions. `$` refers to the row's value column; identifiers refer to
//! columns by label. A string literal on the left of a comparison also
//! resolves as a column reference when a column with that label exists,
//! which is how tag predicates are written (`"t1" == "val1"`).

use ifql_ast::{BinaryOperator, Expression, LogicalOperator};
use ifql_core::block::{ColKind, ColMeta};
use ifql_core::time::Time;
use ifql_core::values::Value;
use ifql_core::{Error, Result};

pub struct RowContext<'a> {
    pub cols: &'a [ColMeta],
    pub row: &'a [Value],
}

impl RowContext<'_> {
    fn lookup(&self, label: &str) -> Option<&Value> {
        self.cols
            .iter()
            .position(|c| c.label == label)
            .map(|i| &self.row[i])
    }

    fn field(&self) -> Option<&Value> {
        self.cols
            .iter()
            .position(|c| c.kind == ColKind::Value)
            .map(|i| &self.row[i])
    }
}

/// Evaluate a predicate to a boolean. Non-boolean results are type errors.
pub fn eval_predicate(expr: &Expression, cx: &RowContext<'_>) -> Result<bool> {
    match eval(expr, cx)? {
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(Error::Type(format!(
            "predicate evaluated to {} instead of a boolean",
            other.data_type_name()
        ))),
        // A row missing a referenced column never matches.
        None => Ok(false),
    }
}

trait DataTypeName {
    fn data_type_name(&self) -> &'static str;
}

impl DataTypeName for Value {
    fn data_type_name(&self) -> &'static str {
        match self.data_type() {
            ifql_core::values::DataType::Time => "time",
            ifql_core::values::DataType::Bool => "bool",
            ifql_core::values::DataType::Int => "int",
            ifql_core::values::DataType::UInt => "uint",
            ifql_core::values::DataType::Float => "float",
            ifql_core::values::DataType::String => "string",
        }
    }
}

/// Evaluate a sub-expression. `None` means a referenced column does not
/// exist in this row.
fn eval(expr: &Expression, cx: &RowContext<'_>) -> Result<Option<Value>> {
    match expr {
        Expression::Logical(l) => {
            let left = eval_bool(&l.left, cx)?;
            match l.operator {
                LogicalOperator::And => {
                    if !left {
                        return Ok(Some(Value::Bool(false)));
                    }
                    Ok(Some(Value::Bool(eval_bool(&l.right, cx)?)))
                }
                LogicalOperator::Or => {
                    if left {
                        return Ok(Some(Value::Bool(true)));
                    }
                    Ok(Some(Value::Bool(eval_bool(&l.right, cx)?)))
                }
            }
        }
        Expression::Binary(b) => eval_binary(b.operator, &b.left, &b.right, cx),
        Expression::Field(_) => Ok(cx.field().cloned()),
        Expression::Identifier(id) => Ok(cx.lookup(&id.name).cloned()),
        Expression::String(s) => Ok(Some(Value::Str(s.value.clone()))),
        Expression::Integer(i) => Ok(Some(Value::Int(i.value))),
        Expression::Float(f) => Ok(Some(Value::Float(f.value))),
        Expression::Duration(d) => Ok(Some(Value::Int(d.nanoseconds()))),
        Expression::DateTime(dt) => {
            let parsed = chrono::DateTime::parse_from_rfc3339(&dt.value)
                .map_err(|e| Error::Type(format!("invalid date-time in predicate: {e}")))?;
            let ns = parsed
                .timestamp_nanos_opt()
                .ok_or_else(|| Error::Type("date-time out of range".into()))?;
            Ok(Some(Value::Time(Time(ns))))
        }
        other => Err(Error::Type(format!(
            "unsupported expression in predicate: {other}"
        ))),
    }
}

fn eval_bool(expr: &Expression, cx: &RowContext<'_>) -> Result<bool> {
    match eval(expr, cx)? {
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(Error::Type(format!(
            "expected boolean operand, got {}",
            other.data_type_name()
        ))),
        None => Ok(false),
    }
}

fn eval_binary(
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
    cx: &RowContext<'_>,
) -> Result<Option<Value>> {
    // Regex matching is an equality form: `col == /re/`.
    if let Expression::Regex(re) = right {
        if matches!(op, BinaryOperator::Eq | BinaryOperator::Neq) {
            let Some(lhs) = resolve_operand(left, cx, true)? else {
                return Ok(Some(Value::Bool(false)));
            };
            let Some(s) = lhs.as_str() else {
                return Err(Error::Type("regex match requires a string operand".into()));
            };
            let compiled = regex::Regex::new(&re.pattern)
                .map_err(|e| Error::Type(format!("invalid regex literal: {e}")))?;
            let matched = compiled.is_match(s);
            return Ok(Some(Value::Bool(match op {
                BinaryOperator::Eq => matched,
                _ => !matched,
            })));
        }
    }

    // `x in [a, b, c]`: membership over the array elements.
    if op == BinaryOperator::In {
        let Expression::Array(arr) = right else {
            return Err(Error::Type("'in' requires an array on the right".into()));
        };
        let Some(lhs) = resolve_operand(left, cx, true)? else {
            return Ok(Some(Value::Bool(false)));
        };
        for element in &arr.elements {
            if let Some(v) = eval(element, cx)? {
                if values_equal(&lhs, &v) {
                    return Ok(Some(Value::Bool(true)));
                }
            }
        }
        return Ok(Some(Value::Bool(false)));
    }

    let lhs = resolve_operand(left, cx, true)?;
    let rhs = resolve_operand(right, cx, false)?;
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return Ok(Some(Value::Bool(false)));
    };

    let result = match op {
        BinaryOperator::Eq => Value::Bool(values_equal(&lhs, &rhs)),
        BinaryOperator::Neq => Value::Bool(!values_equal(&lhs, &rhs)),
        BinaryOperator::Lt => Value::Bool(numeric_cmp(&lhs, &rhs)? < 0.0),
        BinaryOperator::Lte => Value::Bool(numeric_cmp(&lhs, &rhs)? <= 0.0),
        BinaryOperator::Gt => Value::Bool(numeric_cmp(&lhs, &rhs)? > 0.0),
        BinaryOperator::Gte => Value::Bool(numeric_cmp(&lhs, &rhs)? >= 0.0),
        BinaryOperator::StartsWith => match (lhs.as_str(), rhs.as_str()) {
            (Some(l), Some(r)) => Value::Bool(l.starts_with(r)),
            _ => return Err(Error::Type("startswith requires string operands".into())),
        },
        BinaryOperator::Empty => Value::Bool(lhs.as_str().map(str::is_empty).unwrap_or(false)),
        BinaryOperator::NotEmpty => {
            Value::Bool(lhs.as_str().map(|s| !s.is_empty()).unwrap_or(false))
        }
        BinaryOperator::Add => arith(&lhs, &rhs, |a, b| a + b)?,
        BinaryOperator::Sub => arith(&lhs, &rhs, |a, b| a - b)?,
        BinaryOperator::Mul => arith(&lhs, &rhs, |a, b| a * b)?,
        BinaryOperator::Div => arith(&lhs, &rhs, |a, b| a / b)?,
        BinaryOperator::In => return Ok(Some(Value::Bool(false))),
    };
    Ok(Some(result))
}

/// Left comparison operands written as string literals name columns when
/// such a column exists; everything else evaluates normally.
fn resolve_operand(
    expr: &Expression,
    cx: &RowContext<'_>,
    is_left: bool,
) -> Result<Option<Value>> {
    if is_left {
        if let Expression::String(s) = expr {
            if let Some(v) = cx.lookup(&s.value) {
                return Ok(Some(v.clone()));
            }
        }
    }
    eval(expr, cx)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Time(x), Value::Time(y)) => x == y,
        _ => false,
    }
}

fn numeric_cmp(a: &Value, b: &Value) -> Result<f64> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Ok(x - y),
        _ => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Ok(match x.cmp(y) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            }),
            (Value::Time(x), Value::Time(y)) => Ok((x.0 - y.0) as f64),
            _ => Err(Error::Type("operands are not comparable".into())),
        },
    }
}

fn arith(a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Ok(Value::Float(f(x, y))),
        _ => Err(Error::Type("arithmetic requires numeric operands".into())),
    }
}
