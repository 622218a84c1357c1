//! Query builder: AST program to operation graph.
//!
//! Statements are walked in order with an environment mapping variable
//! names to the tail operation of their chain. Each call either roots a
//! new chain (a registered function name) or extends one (a member call on
//! a variable or a prior call). Operation IDs are `kind` + the running
//! call index, so the generated graph is stable for a given program.

use std::collections::HashMap;

use chrono::DateTime as ChronoDateTime;
use ifql_ast::{Expression, Program, Statement};
use ifql_core::ops::OperationSpec;
use ifql_core::spec::{Edge, Operation, OperationId, QuerySpec};
use ifql_core::time::{Duration, OpTime, Time};
use ifql_core::{Error, Result};

/// Validates a call's arguments and produces its operation spec.
pub type CreateOperationSpec = fn(&mut Arguments, &mut BuilderContext) -> Result<OperationSpec>;

/// Name to factory map consulted for every rooted or chained call.
/// Registration is explicit; there is no process-global table.
#[derive(Default)]
pub struct FunctionRegistry {
    funcs: HashMap<String, CreateOperationSpec>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, f: CreateOperationSpec) -> Result<()> {
        if self.funcs.insert(name.to_string(), f).is_some() {
            return Err(Error::Query(format!(
                "duplicate registration for function {name:?}"
            )));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<CreateOperationSpec> {
        self.funcs.get(name).copied()
    }
}

/// A call argument after literal resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    DateTime(Time),
    Regex(String),
    Array(Vec<ArgValue>),
    /// A variable reference resolving to the tail of another chain.
    Table(OperationId),
    Function(ifql_ast::ArrowFunctionExpression),
    Predicate(Expression),
}

/// Named arguments of one call, consumed by the function factory.
/// Arguments left unconsumed after the factory returns are an error.
pub struct Arguments {
    fname: String,
    args: HashMap<String, ArgValue>,
}

impl Arguments {
    pub fn new(fname: impl Into<String>, args: HashMap<String, ArgValue>) -> Self {
        Self {
            fname: fname.into(),
            args,
        }
    }

    pub fn take(&mut self, name: &str) -> Option<ArgValue> {
        self.args.remove(name)
    }

    fn missing(&self, name: &str) -> Error {
        Error::Argument(format!(
            "{} function requires argument {name:?}",
            self.fname
        ))
    }

    fn mistyped(&self, name: &str, want: &str) -> Error {
        Error::Argument(format!(
            "argument {name:?} to {} must be a {want}",
            self.fname
        ))
    }

    pub fn required_string(&mut self, name: &str) -> Result<String> {
        match self.take(name) {
            Some(ArgValue::Str(s)) => Ok(s),
            Some(_) => Err(self.mistyped(name, "string")),
            None => Err(self.missing(name)),
        }
    }

    pub fn optional_u64(&mut self, name: &str) -> Result<Option<u64>> {
        match self.take(name) {
            Some(ArgValue::Int(v)) if v >= 0 => Ok(Some(v as u64)),
            Some(_) => Err(self.mistyped(name, "non-negative integer")),
            None => Ok(None),
        }
    }

    pub fn required_u64(&mut self, name: &str) -> Result<u64> {
        self.optional_u64(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn optional_bool(&mut self, name: &str) -> Result<Option<bool>> {
        match self.take(name) {
            Some(ArgValue::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(self.mistyped(name, "boolean")),
            None => Ok(None),
        }
    }

    pub fn optional_string(&mut self, name: &str) -> Result<Option<String>> {
        match self.take(name) {
            Some(ArgValue::Str(s)) => Ok(Some(s)),
            Some(_) => Err(self.mistyped(name, "string")),
            None => Ok(None),
        }
    }

    /// A time argument: a duration is relative to `now`, a date-time or
    /// integer is absolute.
    pub fn optional_time(&mut self, name: &str) -> Result<Option<OpTime>> {
        match self.take(name) {
            Some(ArgValue::Duration(d)) => Ok(Some(OpTime::relative(d))),
            Some(ArgValue::DateTime(t)) => Ok(Some(OpTime::absolute(t))),
            Some(ArgValue::Int(v)) => Ok(Some(OpTime::absolute(Time(v)))),
            Some(_) => Err(self.mistyped(name, "time")),
            None => Ok(None),
        }
    }

    pub fn required_time(&mut self, name: &str) -> Result<OpTime> {
        self.optional_time(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn optional_duration(&mut self, name: &str) -> Result<Option<Duration>> {
        match self.take(name) {
            Some(ArgValue::Duration(d)) => Ok(Some(d)),
            Some(_) => Err(self.mistyped(name, "duration")),
            None => Ok(None),
        }
    }

    pub fn required_duration(&mut self, name: &str) -> Result<Duration> {
        self.optional_duration(name)?
            .ok_or_else(|| self.missing(name))
    }

    pub fn optional_string_array(&mut self, name: &str) -> Result<Option<Vec<String>>> {
        match self.take(name) {
            Some(ArgValue::Array(items)) => items
                .into_iter()
                .map(|v| match v {
                    ArgValue::Str(s) => Ok(s),
                    _ => Err(self.mistyped(name, "list of strings")),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(_) => Err(self.mistyped(name, "list of strings")),
            None => Ok(None),
        }
    }

    pub fn required_tables(&mut self, name: &str) -> Result<Vec<OperationId>> {
        match self.take(name) {
            Some(ArgValue::Array(items)) => items
                .into_iter()
                .map(|v| match v {
                    ArgValue::Table(id) => Ok(id),
                    _ => Err(self.mistyped(name, "list of tables")),
                })
                .collect(),
            Some(_) => Err(self.mistyped(name, "list of tables")),
            None => Err(self.missing(name)),
        }
    }

    pub fn required_function(&mut self, name: &str) -> Result<ifql_ast::ArrowFunctionExpression> {
        match self.take(name) {
            Some(ArgValue::Function(f)) => Ok(f),
            Some(_) => Err(self.mistyped(name, "function")),
            None => Err(self.missing(name)),
        }
    }

    pub fn required_predicate(&mut self, name: &str) -> Result<Expression> {
        match self.take(name) {
            Some(ArgValue::Predicate(e)) => Ok(e),
            Some(_) => Err(self.mistyped(name, "predicate expression")),
            None => Err(self.missing(name)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Rejects arguments the factory did not consume.
    pub fn finish(&self) -> Result<()> {
        if let Some(name) = self.args.keys().next() {
            return Err(Error::Argument(format!(
                "unknown argument {name:?} to {}",
                self.fname
            )));
        }
        Ok(())
    }
}

/// Per-call context handed to function factories.
pub struct BuilderContext {
    /// True when the call extends a chain (`x.f(...)`).
    pub chained: bool,
    /// Additional parent operations, e.g. the `tables` of a join,
    /// in declared order.
    pub extra_parents: Vec<OperationId>,
}

/// Evaluate a parsed program into an operation graph.
pub fn build_query(program: &Program, registry: &FunctionRegistry) -> Result<QuerySpec> {
    let mut builder = QueryBuilder {
        registry,
        operations: Vec::new(),
        edges: Vec::new(),
        env: HashMap::new(),
        counter: 0,
    };
    for stmt in &program.body {
        match stmt {
            Statement::Variable(decl) => {
                let tail = builder.eval_chain(&decl.init)?;
                builder.env.insert(decl.name.name.clone(), tail);
            }
            Statement::Expression(stmt) => {
                builder.eval_chain(&stmt.expression)?;
            }
        }
    }
    let spec = QuerySpec {
        operations: builder.operations,
        edges: builder.edges,
    };
    spec.validate()?;
    Ok(spec)
}

struct QueryBuilder<'r> {
    registry: &'r FunctionRegistry,
    operations: Vec<Operation>,
    edges: Vec<Edge>,
    env: HashMap<String, OperationId>,
    counter: usize,
}

impl QueryBuilder<'_> {
    /// Evaluates a chain expression to the ID of its tail operation.
    fn eval_chain(&mut self, expr: &Expression) -> Result<OperationId> {
        match expr {
            Expression::Identifier(id) => self
                .env
                .get(&id.name)
                .cloned()
                .ok_or_else(|| Error::Query(format!("undefined identifier {:?}", id.name))),
            Expression::Call(call) => {
                let (fname, parent) = match &call.callee {
                    Expression::Identifier(id) => (id.name.clone(), None),
                    Expression::Member(member) => {
                        let parent = self.eval_chain(&member.object)?;
                        let name = member.property_name().ok_or_else(|| {
                            Error::Query("method name must be an identifier".into())
                        })?;
                        (name.to_string(), Some(parent))
                    }
                    _ => return Err(Error::Query("cannot call a non-function".into())),
                };
                let factory = self
                    .registry
                    .get(&fname)
                    .ok_or_else(|| Error::UnknownFunction(fname.clone()))?;

                let mut values = HashMap::new();
                for arg in &call.arguments {
                    let value = self.arg_value(&arg.value)?;
                    values.insert(arg.name.name.clone(), value);
                }
                let mut args = Arguments::new(fname, values);
                let mut ctx = BuilderContext {
                    chained: parent.is_some(),
                    extra_parents: Vec::new(),
                };
                let spec = factory(&mut args, &mut ctx)?;
                args.finish()?;

                let id = OperationId(format!("{}{}", spec.kind(), self.counter));
                self.counter += 1;
                self.operations.push(Operation {
                    id: id.clone(),
                    spec,
                });
                if let Some(parent) = parent {
                    self.edges.push(Edge {
                        parent,
                        child: id.clone(),
                    });
                }
                for parent in ctx.extra_parents {
                    self.edges.push(Edge {
                        parent,
                        child: id.clone(),
                    });
                }
                Ok(id)
            }
            _ => Err(Error::Query("expected a call expression".into())),
        }
    }

    fn arg_value(&self, expr: &Expression) -> Result<ArgValue> {
        Ok(match expr {
            Expression::String(s) => ArgValue::Str(s.value.clone()),
            Expression::Integer(i) => ArgValue::Int(i.value),
            Expression::Float(f) => ArgValue::Float(f.value),
            Expression::Duration(d) => ArgValue::Duration(Duration(d.nanoseconds())),
            Expression::DateTime(dt) => {
                let parsed = ChronoDateTime::parse_from_rfc3339(&dt.value)
                    .map_err(|e| Error::Argument(format!("invalid date-time: {e}")))?;
                let ns = parsed.timestamp_nanos_opt().ok_or_else(|| {
                    Error::Argument(format!("date-time {:?} out of range", dt.value))
                })?;
                ArgValue::DateTime(Time(ns))
            }
            Expression::Regex(r) => ArgValue::Regex(r.pattern.clone()),
            Expression::Identifier(id) => match id.name.as_str() {
                "true" => ArgValue::Bool(true),
                "false" => ArgValue::Bool(false),
                name => match self.env.get(name) {
                    Some(op) => ArgValue::Table(op.clone()),
                    None => {
                        return Err(Error::Query(format!("undefined identifier {name:?}")));
                    }
                },
            },
            Expression::Array(arr) => ArgValue::Array(
                arr.elements
                    .iter()
                    .map(|e| self.arg_value(e))
                    .collect::<Result<_>>()?,
            ),
            Expression::Arrow(arrow) => ArgValue::Function((**arrow).clone()),
            Expression::Binary(_)
            | Expression::Logical(_)
            | Expression::Field(_)
            | Expression::Member(_) => ArgValue::Predicate(expr.clone()),
            Expression::Call(_) | Expression::Object(_) => {
                return Err(Error::Argument(
                    "unsupported expression in argument position".into(),
                ));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use ifql_core::ops::{FromOpSpec, RangeOpSpec};

    fn test_registry() -> FunctionRegistry {
        let mut r = FunctionRegistry::new();
        r.register("from", |args, ctx| {
            if ctx.chained {
                return Err(Error::Query("from cannot be chained".into()));
            }
            Ok(OperationSpec::From(FromOpSpec {
                database: args.required_string("db")?,
            }))
        })
        .unwrap();
        r.register("range", |args, _| {
            Ok(OperationSpec::Range(RangeOpSpec {
                start: args.required_time("start")?,
                stop: args.optional_time("stop")?.unwrap_or_else(OpTime::now),
            }))
        })
        .unwrap();
        r
    }

    #[test]
    fn generates_ids_and_edges() {
        let program = parse(r#"var a = from(db:"dbA").range(start:-1h)"#).unwrap();
        let q = build_query(&program, &test_registry()).unwrap();
        assert_eq!(q.operations.len(), 2);
        assert_eq!(q.operations[0].id, "from0".into());
        assert_eq!(q.operations[1].id, "range1".into());
        assert_eq!(
            q.edges,
            vec![Edge {
                parent: "from0".into(),
                child: "range1".into(),
            }]
        );
    }

    #[test]
    fn variable_reference_extends_chain() {
        let program = parse(
            r#"
var a = from(db:"dbA")
a.range(start:-1h)
"#,
        )
        .unwrap();
        let q = build_query(&program, &test_registry()).unwrap();
        assert_eq!(q.operations.len(), 2);
        assert_eq!(
            q.edges,
            vec![Edge {
                parent: "from0".into(),
                child: "range1".into(),
            }]
        );
    }

    #[test]
    fn unknown_function_is_an_error() {
        let program = parse(r#"nope(db:"x")"#).unwrap();
        let err = build_query(&program, &test_registry()).unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(name) if name == "nope"));
    }

    #[test]
    fn unknown_argument_is_an_error() {
        let program = parse(r#"from(db:"x", bogus:1)"#).unwrap();
        let err = build_query(&program, &test_registry()).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn missing_argument_is_an_error() {
        let program = parse(r#"from(x:"x")"#).unwrap();
        let err = build_query(&program, &test_registry()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("db"), "unexpected message: {msg}");
    }
}
