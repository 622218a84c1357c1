//! AST for the IFQL query language.
//!
//! A program is a sequence of variable bindings and call expressions.
//! Expressions nest through member access and method chains; predicate
//! bodies (`where` blocks, join functions) reuse the same expression type.
//!
//! Expression nodes serialize type-tagged (`{"type":"BinaryExpression",...}`)
//! so predicates can travel inside operation specs on the wire.

mod fmt;

use serde::{Deserialize, Serialize};

/// Source position, 1-based line and column plus byte offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
    pub offset: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32, offset: u32) -> Self {
        Self { line, col, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    #[serde(rename = "VariableDeclaration")]
    Variable(VariableDeclaration),
    #[serde(rename = "ExpressionStatement")]
    Expression(ExpressionStatement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub name: Identifier,
    pub init: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    #[serde(rename = "Identifier")]
    Identifier(Identifier),
    #[serde(rename = "StringLiteral")]
    String(StringLiteral),
    #[serde(rename = "IntegerLiteral")]
    Integer(IntegerLiteral),
    #[serde(rename = "FloatLiteral")]
    Float(FloatLiteral),
    #[serde(rename = "DurationLiteral")]
    Duration(DurationLiteral),
    #[serde(rename = "DateTimeLiteral")]
    DateTime(DateTimeLiteral),
    #[serde(rename = "RegexLiteral")]
    Regex(RegexLiteral),
    #[serde(rename = "FieldLiteral")]
    Field(FieldLiteral),
    #[serde(rename = "BinaryExpression")]
    Binary(Box<BinaryExpression>),
    #[serde(rename = "LogicalExpression")]
    Logical(Box<LogicalExpression>),
    #[serde(rename = "MemberExpression")]
    Member(Box<MemberExpression>),
    #[serde(rename = "CallExpression")]
    Call(Box<CallExpression>),
    #[serde(rename = "ObjectExpression")]
    Object(ObjectExpression),
    #[serde(rename = "ArrayExpression")]
    Array(ArrayExpression),
    #[serde(rename = "ArrowFunctionExpression")]
    Arrow(Box<ArrowFunctionExpression>),
}

impl Expression {
    /// Shorthand for an identifier expression.
    pub fn ident(name: impl Into<String>) -> Self {
        Expression::Identifier(Identifier::new(name))
    }

    /// Shorthand for a string literal expression.
    pub fn string(value: impl Into<String>) -> Self {
        Expression::String(StringLiteral {
            value: value.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    #[serde(skip)]
    pub pos: Pos,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pos: Pos::default(),
        }
    }
}

// Positions are diagnostics only and do not participate in equality.
impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringLiteral {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerLiteral {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatLiteral {
    pub value: f64,
}

/// A multi-unit duration such as `1h30m`. Components are kept separate so
/// the literal can be printed back exactly; the total is their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationLiteral {
    pub values: Vec<DurationComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationComponent {
    pub magnitude: i64,
    pub unit: String,
}

impl DurationLiteral {
    /// Sum of all components in nanoseconds. Unknown units were rejected by
    /// the lexer, so this cannot fail after parsing.
    pub fn nanoseconds(&self) -> i64 {
        self.values
            .iter()
            .map(|c| {
                let scale: i64 = match c.unit.as_str() {
                    "ns" => 1,
                    "us" | "\u{00b5}s" | "\u{03bc}s" => 1_000,
                    "ms" => 1_000_000,
                    "s" => 1_000_000_000,
                    "m" => 60 * 1_000_000_000,
                    "h" => 3_600 * 1_000_000_000,
                    _ => 0,
                };
                c.magnitude.saturating_mul(scale)
            })
            .sum()
    }
}

/// RFC3339 date-time, kept as written for round-tripping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTimeLiteral {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexLiteral {
    pub pattern: String,
}

/// The `$` marker referring to the value column of the current row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldLiteral {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Expression,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub operator: LogicalOperator,
    pub left: Expression,
    pub right: Expression,
}

/// `object.property` or `object["property"]`. The property is an identifier
/// or a string literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpression {
    pub object: Expression,
    pub property: Expression,
}

impl MemberExpression {
    /// The property name, for either spelling.
    pub fn property_name(&self) -> Option<&str> {
        match &self.property {
            Expression::Identifier(id) => Some(&id.name),
            Expression::String(s) => Some(&s.value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: Expression,
    pub arguments: Vec<Argument>,
    #[serde(skip)]
    pub pos: Pos,
}

impl PartialEq for CallExpression {
    fn eq(&self, other: &Self) -> bool {
        self.callee == other.callee && self.arguments == other.arguments
    }
}

/// A named call argument `name: value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: Identifier,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectExpression {
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: Identifier,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpression {
    pub elements: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowFunctionExpression {
    pub params: Vec<Identifier>,
    pub body: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "not empty")]
    NotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_literal_sums_components() {
        let d = DurationLiteral {
            values: vec![
                DurationComponent {
                    magnitude: 1,
                    unit: "h".into(),
                },
                DurationComponent {
                    magnitude: 30,
                    unit: "m".into(),
                },
                DurationComponent {
                    magnitude: 15,
                    unit: "s".into(),
                },
            ],
        };
        assert_eq!(d.nanoseconds(), 5_415_000_000_000);
    }

    #[test]
    fn expression_json_is_type_tagged() {
        let expr = Expression::Binary(Box::new(BinaryExpression {
            operator: BinaryOperator::Add,
            left: Expression::Member(Box::new(MemberExpression {
                object: Expression::ident("a"),
                property: Expression::string("_value"),
            })),
            right: Expression::Member(Box::new(MemberExpression {
                object: Expression::ident("b"),
                property: Expression::string("_value"),
            })),
        }));
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["type"], "BinaryExpression");
        assert_eq!(json["operator"], "+");
        assert_eq!(json["left"]["type"], "MemberExpression");
        assert_eq!(json["left"]["object"]["name"], "a");

        let back: Expression = serde_json::from_value(json).unwrap();
        assert_eq!(back, expr);
    }

    #[test]
    fn identifier_equality_ignores_position() {
        let a = Identifier {
            name: "x".into(),
            pos: Pos::new(1, 1, 0),
        };
        let b = Identifier {
            name: "x".into(),
            pos: Pos::new(4, 9, 120),
        };
        assert_eq!(a, b);
    }
}
