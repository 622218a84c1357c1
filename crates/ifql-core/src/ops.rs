//! Operation specs: the polymorphic payload of a query graph vertex.
//!
//! `OperationSpec` is an adjacently tagged enum so an `Operation`
//! serializes to `{"id": ..., "kind": ..., "spec": {...}}`. Capability
//! queries on specs are plain methods; name-based construction from call
//! arguments lives in the function registry.

use ifql_ast::{ArrowFunctionExpression, Expression};
use serde::{Deserialize, Serialize};

use crate::time::{Duration, OpTime};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "lowercase")]
pub enum OperationSpec {
    From(FromOpSpec),
    Range(RangeOpSpec),
    Where(WhereOpSpec),
    Limit(LimitOpSpec),
    Window(WindowOpSpec),
    Merge(MergeOpSpec),
    Join(JoinOpSpec),
    Count(CountOpSpec),
    Sum(SumOpSpec),
    Mean(MeanOpSpec),
    Stddev(StddevOpSpec),
    Min(MinOpSpec),
    Max(MaxOpSpec),
    First(FirstOpSpec),
    Last(LastOpSpec),
}

impl OperationSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            OperationSpec::From(_) => "from",
            OperationSpec::Range(_) => "range",
            OperationSpec::Where(_) => "where",
            OperationSpec::Limit(_) => "limit",
            OperationSpec::Window(_) => "window",
            OperationSpec::Merge(_) => "merge",
            OperationSpec::Join(_) => "join",
            OperationSpec::Count(_) => "count",
            OperationSpec::Sum(_) => "sum",
            OperationSpec::Mean(_) => "mean",
            OperationSpec::Stddev(_) => "stddev",
            OperationSpec::Min(_) => "min",
            OperationSpec::Max(_) => "max",
            OperationSpec::First(_) => "first",
            OperationSpec::Last(_) => "last",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromOpSpec {
    pub database: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeOpSpec {
    pub start: OpTime,
    pub stop: OpTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereOpSpec {
    pub predicate: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitOpSpec {
    pub n: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowOpSpec {
    pub every: Duration,
    pub period: Duration,
    #[serde(default)]
    pub start: OpTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOpSpec {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinOpSpec {
    #[serde(default)]
    pub on: Vec<String>,
    pub expression: ArrowFunctionExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CountOpSpec {}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SumOpSpec {}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeanOpSpec {}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StddevOpSpec {}

/// Shared surface of the selector kinds: which column drives the
/// selection and which time lands on the output row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorOptions {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub use_start_time: bool,
    #[serde(default)]
    pub use_row_time: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MinOpSpec {
    #[serde(flatten)]
    pub options: SelectorOptions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaxOpSpec {
    #[serde(flatten)]
    pub options: SelectorOptions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FirstOpSpec {
    #[serde(flatten)]
    pub options: SelectorOptions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LastOpSpec {
    #[serde(flatten)]
    pub options: SelectorOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Time;

    #[test]
    fn kind_strings_match_serde_tags() {
        let spec = OperationSpec::Range(RangeOpSpec {
            start: OpTime::relative(Duration::hours(-1)),
            stop: OpTime::now(),
        });
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], spec.kind());
    }

    #[test]
    fn spec_json_round_trips() {
        let specs = vec![
            OperationSpec::From(FromOpSpec {
                database: "mydb".into(),
            }),
            OperationSpec::Range(RangeOpSpec {
                start: OpTime::absolute(Time(0)),
                stop: OpTime::absolute(Time(10)),
            }),
            OperationSpec::Limit(LimitOpSpec { n: 10 }),
            OperationSpec::Count(CountOpSpec {}),
            OperationSpec::Min(MinOpSpec {
                options: SelectorOptions {
                    column: Some("x".into()),
                    use_row_time: true,
                    ..SelectorOptions::default()
                },
            }),
        ];
        for spec in specs {
            let json = serde_json::to_string(&spec).unwrap();
            let back: OperationSpec = serde_json::from_str(&json).unwrap();
            assert_eq!(back, spec, "round trip failed for {json}");
        }
    }
}
