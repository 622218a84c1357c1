//! Logical planning: one procedure per operation, topology preserved.

use indexmap::IndexMap;

use ifql_core::ops::OperationSpec;
use ifql_core::spec::QuerySpec;
use ifql_core::Result;

use crate::procedure::{
    AggregateKind, AggregateProcedureSpec, LimitProcedureSpec, MergeJoinProcedureSpec,
    MergeProcedureSpec, Procedure, ProcedureId, ProcedureSpec, RangeProcedureSpec,
    SelectProcedureSpec, SelectorKind, SelectorProcedureSpec, WhereProcedureSpec,
    WindowProcedureSpec,
};

#[derive(Debug, Clone, Default)]
pub struct LogicalPlanSpec {
    pub procedures: IndexMap<ProcedureId, Procedure>,
    pub order: Vec<ProcedureId>,
}

/// Map a validated query spec onto procedures in topological order.
pub fn create_logical_plan(query: &QuerySpec) -> Result<LogicalPlanSpec> {
    query.validate()?;
    let order: Vec<ProcedureId> = query
        .topological_order()?
        .iter()
        .map(ProcedureId::from)
        .collect();

    let mut procedures = IndexMap::with_capacity(query.operations.len());
    for op in &query.operations {
        let id = ProcedureId::from(&op.id);
        let parents = query
            .parents_of(&op.id)
            .into_iter()
            .map(ProcedureId::from)
            .collect();
        let children = query
            .children_of(&op.id)
            .into_iter()
            .map(ProcedureId::from)
            .collect();
        procedures.insert(
            id.clone(),
            Procedure {
                id,
                spec: procedure_spec(&op.spec),
                parents,
                children,
            },
        );
    }
    Ok(LogicalPlanSpec { procedures, order })
}

/// Lower an operation spec to its procedure spec. `from` becomes the
/// select procedure that later pushdowns mutate.
pub fn procedure_spec(op: &OperationSpec) -> ProcedureSpec {
    match op {
        OperationSpec::From(f) => ProcedureSpec::Select(SelectProcedureSpec {
            database: f.database.clone(),
            ..SelectProcedureSpec::default()
        }),
        OperationSpec::Range(r) => ProcedureSpec::Range(RangeProcedureSpec {
            bounds: ifql_core::time::BoundsSpec {
                start: r.start,
                stop: r.stop,
            },
        }),
        OperationSpec::Where(w) => ProcedureSpec::Where(WhereProcedureSpec {
            predicate: w.predicate.clone(),
        }),
        OperationSpec::Limit(l) => ProcedureSpec::Limit(LimitProcedureSpec { n: l.n }),
        OperationSpec::Window(w) => ProcedureSpec::Window(WindowProcedureSpec {
            every: w.every,
            period: w.period,
            start: w.start,
        }),
        OperationSpec::Merge(m) => ProcedureSpec::Merge(MergeProcedureSpec {
            keys: m.keys.clone(),
        }),
        OperationSpec::Join(j) => ProcedureSpec::Join(MergeJoinProcedureSpec {
            on: j.on.clone(),
            expression: j.expression.clone(),
        }),
        OperationSpec::Count(_) => ProcedureSpec::Aggregate(AggregateProcedureSpec {
            kind: AggregateKind::Count,
        }),
        OperationSpec::Sum(_) => ProcedureSpec::Aggregate(AggregateProcedureSpec {
            kind: AggregateKind::Sum,
        }),
        OperationSpec::Mean(_) => ProcedureSpec::Aggregate(AggregateProcedureSpec {
            kind: AggregateKind::Mean,
        }),
        OperationSpec::Stddev(_) => ProcedureSpec::Aggregate(AggregateProcedureSpec {
            kind: AggregateKind::Stddev,
        }),
        OperationSpec::Min(s) => ProcedureSpec::Selector(SelectorProcedureSpec {
            kind: SelectorKind::Min,
            options: s.options.clone(),
        }),
        OperationSpec::Max(s) => ProcedureSpec::Selector(SelectorProcedureSpec {
            kind: SelectorKind::Max,
            options: s.options.clone(),
        }),
        OperationSpec::First(s) => ProcedureSpec::Selector(SelectorProcedureSpec {
            kind: SelectorKind::First,
            options: s.options.clone(),
        }),
        OperationSpec::Last(s) => ProcedureSpec::Selector(SelectorProcedureSpec {
            kind: SelectorKind::Last,
            options: s.options.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifql_core::ops::{FromOpSpec, RangeOpSpec};
    use ifql_core::spec::{Edge, Operation};
    use ifql_core::time::{Duration, OpTime};

    #[test]
    fn preserves_topology() {
        let q = QuerySpec {
            operations: vec![
                Operation {
                    id: "from0".into(),
                    spec: OperationSpec::From(FromOpSpec {
                        database: "db".into(),
                    }),
                },
                Operation {
                    id: "range1".into(),
                    spec: OperationSpec::Range(RangeOpSpec {
                        start: OpTime::relative(Duration::hours(-1)),
                        stop: OpTime::now(),
                    }),
                },
            ],
            edges: vec![Edge {
                parent: "from0".into(),
                child: "range1".into(),
            }],
        };
        let lp = create_logical_plan(&q).unwrap();
        assert_eq!(lp.order.len(), 2);
        let select = &lp.procedures[&ProcedureId::from("from0")];
        assert_eq!(select.children, vec![ProcedureId::from("range1")]);
        assert!(matches!(select.spec, ProcedureSpec::Select(_)));
        let range = &lp.procedures[&ProcedureId::from("range1")];
        assert_eq!(range.parents, vec![ProcedureId::from("from0")]);
    }
}
