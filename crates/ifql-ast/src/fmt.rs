//! Source reconstruction for AST nodes.
//!
//! `Display` output parses back to an equal AST; it matches the original
//! text up to whitespace. Operands are parenthesized only where precedence
//! demands it, so parentheses present in the source survive the round trip.

use std::fmt;

use crate::*;

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.body.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Variable(v) => write!(f, "var {} = {}", v.name.name, v.init),
            Statement::Expression(e) => write!(f, "{}", e.expression),
        }
    }
}

/// Binding strength of an expression, used to decide parenthesization.
fn precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::Logical(l) => match l.operator {
            LogicalOperator::Or => 1,
            LogicalOperator::And => 2,
        },
        Expression::Binary(b) => match b.operator {
            BinaryOperator::Eq | BinaryOperator::Neq => 3,
            BinaryOperator::Lt
            | BinaryOperator::Lte
            | BinaryOperator::Gt
            | BinaryOperator::Gte
            | BinaryOperator::StartsWith
            | BinaryOperator::In
            | BinaryOperator::Empty
            | BinaryOperator::NotEmpty => 4,
            BinaryOperator::Add | BinaryOperator::Sub => 5,
            BinaryOperator::Mul | BinaryOperator::Div => 6,
        },
        _ => 7,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expression, min: u8) -> fmt::Result {
    if precedence(operand) < min {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(id) => write!(f, "{}", id.name),
            Expression::String(s) => write!(f, "\"{}\"", escape_string(&s.value)),
            Expression::Integer(i) => write!(f, "{}", i.value),
            Expression::Float(v) => {
                if v.value.fract() == 0.0 && v.value.is_finite() {
                    write!(f, "{:.1}", v.value)
                } else {
                    write!(f, "{}", v.value)
                }
            }
            Expression::Duration(d) => {
                for c in &d.values {
                    write!(f, "{}{}", c.magnitude, c.unit)?;
                }
                Ok(())
            }
            Expression::DateTime(dt) => write!(f, "{}", dt.value),
            Expression::Regex(r) => write!(f, "/{}/", r.pattern.replace('/', "\\/")),
            Expression::Field(_) => write!(f, "$"),
            Expression::Binary(b) => {
                let prec = precedence(self);
                write_operand(f, &b.left, prec)?;
                write!(f, " {} ", b.operator)?;
                // Left associativity: an equal-precedence right operand was
                // parenthesized in the source.
                write_operand(f, &b.right, prec + 1)
            }
            Expression::Logical(l) => {
                let prec = precedence(self);
                write_operand(f, &l.left, prec)?;
                write!(f, " {} ", l.operator)?;
                write_operand(f, &l.right, prec + 1)
            }
            Expression::Member(m) => match &m.property {
                Expression::String(s) => {
                    write!(f, "{}[\"{}\"]", m.object, escape_string(&s.value))
                }
                other => write!(f, "{}.{}", m.object, other),
            },
            Expression::Call(c) => {
                write!(f, "{}(", c.callee)?;
                for (i, arg) in c.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}:", arg.name.name)?;
                    write_argument_value(f, &arg.value)?;
                }
                write!(f, ")")
            }
            Expression::Object(o) => {
                write!(f, "{{")?;
                for (i, p) in o.properties.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", p.key.name, p.value)?;
                }
                write!(f, "}}")
            }
            Expression::Array(a) => {
                write!(f, "[")?;
                for (i, e) in a.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            Expression::Arrow(a) => {
                if a.params.len() == 1 {
                    write!(f, "{} => {}", a.params[0].name, a.body)
                } else {
                    write!(f, "(")?;
                    for (i, p) in a.params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", p.name)?;
                    }
                    write!(f, ") => {}", a.body)
                }
            }
        }
    }
}

/// Predicate-shaped argument values were written as `{ expr }` blocks.
fn write_argument_value(f: &mut fmt::Formatter<'_>, value: &Expression) -> fmt::Result {
    match value {
        Expression::Binary(_) | Expression::Logical(_) | Expression::Field(_) => {
            write!(f, "{{{value}}}")
        }
        other => write!(f, "{other}"),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "==",
            BinaryOperator::Neq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
            BinaryOperator::StartsWith => "startswith",
            BinaryOperator::In => "in",
            BinaryOperator::Empty => "empty",
            BinaryOperator::NotEmpty => "not empty",
        };
        f.write_str(s)
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        })
    }
}
