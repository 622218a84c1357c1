//! Procedures: plan-level vertices and their capability surface.
//!
//! Specs are a tagged enum. Capabilities are plain methods: a spec may
//! declare time bounds, and it may declare a pushdown rule naming the root
//! kind it mutates and the kinds it is allowed to pass through. Parent and
//! child edges are ID lists on the procedure, never back pointers.

use std::fmt;

use ifql_ast::{ArrowFunctionExpression, Expression};
use serde::{Deserialize, Serialize};

use ifql_core::ops::SelectorOptions;
use ifql_core::spec::OperationId;
use ifql_core::time::{BoundsSpec, Duration, OpTime};
use ifql_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureId(pub String);

impl From<&OperationId> for ProcedureId {
    fn from(id: &OperationId) -> Self {
        ProcedureId(id.0.clone())
    }
}

impl From<&str> for ProcedureId {
    fn from(s: &str) -> Self {
        ProcedureId(s.to_string())
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: ProcedureId,
    pub spec: ProcedureSpec,
    pub parents: Vec<ProcedureId>,
    pub children: Vec<ProcedureId>,
}

/// Where a pushdown may travel: descend through `through` kinds until a
/// `root` kind is found, then mutate the root in place.
#[derive(Debug, Clone, Copy)]
pub struct PushDownRule {
    pub root: &'static str,
    pub through: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "lowercase")]
pub enum ProcedureSpec {
    Select(SelectProcedureSpec),
    Range(RangeProcedureSpec),
    Where(WhereProcedureSpec),
    Limit(LimitProcedureSpec),
    Window(WindowProcedureSpec),
    Merge(MergeProcedureSpec),
    Join(MergeJoinProcedureSpec),
    Aggregate(AggregateProcedureSpec),
    Selector(SelectorProcedureSpec),
}

/// The storage read. Pushdowns land here: bounds from `range`, the
/// predicate from `where`, the row cap from `limit`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectProcedureSpec {
    pub database: String,
    #[serde(default)]
    pub bounds: BoundsSpec,
    #[serde(default)]
    pub bounds_set: bool,
    #[serde(default)]
    pub predicate: Option<Expression>,
    #[serde(default)]
    pub predicate_set: bool,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub limit_set: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeProcedureSpec {
    pub bounds: BoundsSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereProcedureSpec {
    pub predicate: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitProcedureSpec {
    pub n: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowProcedureSpec {
    pub every: Duration,
    pub period: Duration,
    #[serde(default)]
    pub start: OpTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeProcedureSpec {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeJoinProcedureSpec {
    #[serde(default)]
    pub on: Vec<String>,
    pub expression: ArrowFunctionExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Count,
    Sum,
    Mean,
    Stddev,
}

impl AggregateKind {
    pub fn name(self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
            AggregateKind::Sum => "sum",
            AggregateKind::Mean => "mean",
            AggregateKind::Stddev => "stddev",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateProcedureSpec {
    pub kind: AggregateKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Min,
    Max,
    First,
    Last,
}

impl SelectorKind {
    pub fn name(self) -> &'static str {
        match self {
            SelectorKind::Min => "min",
            SelectorKind::Max => "max",
            SelectorKind::First => "first",
            SelectorKind::Last => "last",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorProcedureSpec {
    pub kind: SelectorKind,
    #[serde(default)]
    pub options: SelectorOptions,
}

pub const SELECT_KIND: &str = "select";
pub const RANGE_KIND: &str = "range";
pub const WHERE_KIND: &str = "where";
pub const LIMIT_KIND: &str = "limit";

impl ProcedureSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ProcedureSpec::Select(_) => SELECT_KIND,
            ProcedureSpec::Range(_) => RANGE_KIND,
            ProcedureSpec::Where(_) => WHERE_KIND,
            ProcedureSpec::Limit(_) => LIMIT_KIND,
            ProcedureSpec::Window(_) => "window",
            ProcedureSpec::Merge(_) => "merge",
            ProcedureSpec::Join(_) => "join",
            ProcedureSpec::Aggregate(a) => a.kind.name(),
            ProcedureSpec::Selector(s) => s.kind.name(),
        }
    }

    /// Declared time bounds, if this spec carries any.
    pub fn time_bounds(&self) -> Option<BoundsSpec> {
        match self {
            ProcedureSpec::Range(r) => Some(r.bounds),
            ProcedureSpec::Select(s) if s.bounds_set => Some(s.bounds),
            _ => None,
        }
    }

    pub fn push_down_rule(&self) -> Option<PushDownRule> {
        match self {
            ProcedureSpec::Range(_) => Some(PushDownRule {
                root: SELECT_KIND,
                through: &[LIMIT_KIND, WHERE_KIND],
            }),
            ProcedureSpec::Where(_) => Some(PushDownRule {
                root: SELECT_KIND,
                through: &[LIMIT_KIND, RANGE_KIND],
            }),
            ProcedureSpec::Limit(_) => Some(PushDownRule {
                root: SELECT_KIND,
                through: &[RANGE_KIND, WHERE_KIND],
            }),
            _ => None,
        }
    }

    /// Absorb this spec into `root`. A second pushdown of the same kind
    /// overwrites conservatively and reports the ambiguity.
    pub fn push_down(&self, root: &mut ProcedureSpec, warnings: &mut Vec<String>) -> Result<()> {
        let ProcedureSpec::Select(select) = root else {
            return Err(Error::Plan(format!(
                "cannot push {} into {} procedure",
                self.kind(),
                root.kind()
            )));
        };
        match self {
            ProcedureSpec::Range(r) => {
                if select.bounds_set {
                    warnings.push(format!(
                        "multiple ranges pushed into select on {:?}; later range wins",
                        select.database
                    ));
                }
                select.bounds_set = true;
                select.bounds = r.bounds;
            }
            ProcedureSpec::Where(w) => {
                if select.predicate_set {
                    warnings.push(format!(
                        "multiple predicates pushed into select on {:?}; later predicate wins",
                        select.database
                    ));
                }
                select.predicate_set = true;
                select.predicate = Some(w.predicate.clone());
            }
            ProcedureSpec::Limit(l) => {
                if select.limit_set {
                    warnings.push(format!(
                        "multiple limits pushed into select on {:?}; later limit wins",
                        select.database
                    ));
                }
                select.limit_set = true;
                select.limit = Some(l.n);
            }
            other => {
                return Err(Error::Plan(format!(
                    "{} procedure is not pushable",
                    other.kind()
                )));
            }
        }
        Ok(())
    }

    /// Plan-time validation of the finished spec.
    pub fn validate(&self) -> Result<()> {
        match self {
            ProcedureSpec::Select(s) => {
                if !s.bounds_set {
                    return Err(Error::Plan(format!(
                        "select on database {:?} has no time range; add a range call",
                        s.database
                    )));
                }
                Ok(())
            }
            ProcedureSpec::Window(w) => {
                if !w.every.is_positive() || !w.period.is_positive() {
                    return Err(Error::Plan(
                        "window every and period must be positive".into(),
                    ));
                }
                Ok(())
            }
            ProcedureSpec::Join(j) => {
                if j.expression.params.len() != 2 {
                    return Err(Error::Plan(
                        "join function must take exactly two parameters".into(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
