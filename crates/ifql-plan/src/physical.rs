//! Physical planning: pushdown rewriting and bounds resolution.
//!
//! Procedures are visited in topological order. A pushable procedure walks
//! each parent path through its rule's `through` kinds; when every path
//! lands on the root kind, the spec mutates the roots and the procedure is
//! spliced out of the graph. Declared bounds resolve against `now` and
//! union into the plan bounds. Childless procedures become the results.

use indexmap::IndexMap;
use serde::Serialize;

use ifql_core::time::{Bounds, Time};
use ifql_core::Result;

use crate::logical::LogicalPlanSpec;
use crate::procedure::{Procedure, ProcedureId, ProcedureSpec, PushDownRule};

#[derive(Debug, Clone, Serialize)]
pub struct PlanSpec {
    pub now: Time,
    /// Union of every declared time bound, resolved against `now`. All
    /// remaining procedure bounds lie within it.
    pub bounds: Bounds,
    pub procedures: IndexMap<ProcedureId, Procedure>,
    pub order: Vec<ProcedureId>,
    /// Procedures with no children; each is a query result.
    pub results: Vec<ProcedureId>,
    /// Ambiguities the planner resolved conservatively.
    pub warnings: Vec<String>,
}

impl PlanSpec {
    pub fn procedure(&self, id: &ProcedureId) -> Option<&Procedure> {
        self.procedures.get(id)
    }
}

/// Rewrite a logical plan into an executable physical plan.
pub fn plan(lp: &LogicalPlanSpec, now: Time) -> Result<PlanSpec> {
    let mut procedures = lp.procedures.clone();
    let mut order = lp.order.clone();
    let mut bounds = Bounds::EMPTY;
    let mut warnings = Vec::new();

    for id in &lp.order {
        let Some(proc) = procedures.get(id) else {
            continue;
        };
        let spec = proc.spec.clone();
        let parents = proc.parents.clone();

        if let Some(declared) = spec.time_bounds() {
            bounds = bounds.union(&declared.resolve(now));
        }

        if let Some(rule) = spec.push_down_rule() {
            let mut roots = Vec::new();
            let all_reach_root = find_roots(&procedures, &parents, &rule, &mut roots);
            if all_reach_root && !roots.is_empty() {
                for root_id in &roots {
                    if let Some(root) = procedures.get_mut(root_id) {
                        spec.push_down(&mut root.spec, &mut warnings)?;
                    }
                }
                remove_procedure(&mut procedures, &mut order, id);
            } else {
                warnings.push(format!(
                    "{} procedure {id} cannot reach a select root; leaving it in the plan",
                    spec.kind()
                ));
            }
        }
    }

    let results: Vec<ProcedureId> = order
        .iter()
        .filter(|id| {
            procedures
                .get(*id)
                .map(|p| p.children.is_empty())
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    for id in &order {
        if let Some(p) = procedures.get(id) {
            p.spec.validate()?;
        }
    }

    Ok(PlanSpec {
        now,
        bounds,
        procedures,
        order,
        results,
        warnings,
    })
}

/// Walk parent paths collecting pushdown roots. Returns false when any
/// path hits a kind that is neither the root nor in the through set.
fn find_roots(
    procedures: &IndexMap<ProcedureId, Procedure>,
    parents: &[ProcedureId],
    rule: &PushDownRule,
    roots: &mut Vec<ProcedureId>,
) -> bool {
    let mut all = true;
    for pid in parents {
        let Some(parent) = procedures.get(pid) else {
            all = false;
            continue;
        };
        let kind = parent.spec.kind();
        if kind == rule.root {
            if !roots.contains(pid) {
                roots.push(pid.clone());
            }
        } else if rule.through.contains(&kind) {
            all &= find_roots(procedures, &parent.parents, rule, roots);
        } else {
            all = false;
        }
    }
    all
}

/// Splice a procedure out: its children's parent lists point at its
/// parents and vice versa, order preserved, duplicates dropped.
fn remove_procedure(
    procedures: &mut IndexMap<ProcedureId, Procedure>,
    order: &mut Vec<ProcedureId>,
    id: &ProcedureId,
) {
    let Some(removed) = procedures.shift_remove(id) else {
        return;
    };
    order.retain(|x| x != id);

    for pid in &removed.parents {
        if let Some(parent) = procedures.get_mut(pid) {
            parent.children.retain(|c| c != id);
            for child in &removed.children {
                if !parent.children.contains(child) {
                    parent.children.push(child.clone());
                }
            }
        }
    }
    for cid in &removed.children {
        if let Some(child) = procedures.get_mut(cid) {
            child.parents.retain(|p| p != id);
            for parent in &removed.parents {
                if !child.parents.contains(parent) {
                    child.parents.push(parent.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::create_logical_plan;
    use crate::procedure::SelectorKind;
    use ifql_ast::{Expression, FieldLiteral};
    use ifql_core::ops::*;
    use ifql_core::spec::{Edge, Operation, QuerySpec};
    use ifql_core::time::{Duration, OpTime};

    fn chain(ops: Vec<(&str, OperationSpec)>) -> QuerySpec {
        let operations: Vec<Operation> = ops
            .into_iter()
            .map(|(id, spec)| Operation {
                id: id.into(),
                spec,
            })
            .collect();
        let edges = operations
            .windows(2)
            .map(|w| Edge {
                parent: w[0].id.clone(),
                child: w[1].id.clone(),
            })
            .collect();
        QuerySpec { operations, edges }
    }

    fn from_spec() -> OperationSpec {
        OperationSpec::From(FromOpSpec {
            database: "db".into(),
        })
    }

    fn range_spec(start: i64, stop: i64) -> OperationSpec {
        OperationSpec::Range(RangeOpSpec {
            start: OpTime::absolute(Time(start)),
            stop: OpTime::absolute(Time(stop)),
        })
    }

    #[test]
    fn range_where_limit_absorb_into_select() {
        let q = chain(vec![
            ("from0", from_spec()),
            ("range1", range_spec(0, 100)),
            (
                "where2",
                OperationSpec::Where(WhereOpSpec {
                    predicate: Expression::Field(FieldLiteral {}),
                }),
            ),
            ("limit3", OperationSpec::Limit(LimitOpSpec { n: 10 })),
        ]);
        let lp = create_logical_plan(&q).unwrap();
        let p = plan(&lp, Time(1_000)).unwrap();

        assert_eq!(p.order, vec![ProcedureId::from("from0")]);
        assert_eq!(p.results, vec![ProcedureId::from("from0")]);
        let ProcedureSpec::Select(select) = &p.procedures[&ProcedureId::from("from0")].spec else {
            panic!("expected select");
        };
        assert!(select.bounds_set);
        assert_eq!(select.bounds.resolve(p.now), Bounds::new(Time(0), Time(100)));
        assert!(select.predicate_set);
        assert_eq!(select.limit, Some(10));
        assert_eq!(p.bounds, Bounds::new(Time(0), Time(100)));
        assert!(p.warnings.is_empty());
    }

    #[test]
    fn relative_bounds_resolve_against_now() {
        let q = chain(vec![
            ("from0", from_spec()),
            (
                "range1",
                OperationSpec::Range(RangeOpSpec {
                    start: OpTime::relative(Duration::hours(-1)),
                    stop: OpTime::now(),
                }),
            ),
        ]);
        let lp = create_logical_plan(&q).unwrap();
        let now = Time(Duration::hours(2).0);
        let p = plan(&lp, now).unwrap();
        assert_eq!(p.bounds, Bounds::new(Time(Duration::hours(1).0), now));
    }

    #[test]
    fn terminal_aggregate_survives_planning() {
        let q = chain(vec![
            ("from0", from_spec()),
            ("range1", range_spec(0, 100)),
            (
                "count2",
                OperationSpec::Count(CountOpSpec {}),
            ),
        ]);
        let lp = create_logical_plan(&q).unwrap();
        let p = plan(&lp, Time(0)).unwrap();
        assert_eq!(p.results, vec![ProcedureId::from("count2")]);
        let count = &p.procedures[&ProcedureId::from("count2")];
        assert_eq!(count.parents, vec![ProcedureId::from("from0")]);
    }

    #[test]
    fn double_range_overwrites_with_warning() {
        let q = chain(vec![
            ("from0", from_spec()),
            ("range1", range_spec(0, 100)),
            ("range2", range_spec(50, 200)),
        ]);
        let lp = create_logical_plan(&q).unwrap();
        let p = plan(&lp, Time(0)).unwrap();
        let ProcedureSpec::Select(select) = &p.procedures[&ProcedureId::from("from0")].spec else {
            panic!("expected select");
        };
        // Later range wins; both still union into the plan bounds.
        assert_eq!(
            select.bounds.resolve(p.now),
            Bounds::new(Time(50), Time(200))
        );
        assert_eq!(p.bounds, Bounds::new(Time(0), Time(200)));
        assert_eq!(p.warnings.len(), 1);
    }

    #[test]
    fn unreachable_pushdown_stays_in_graph() {
        // A limit above a selector has no select root to land on.
        let q = chain(vec![
            ("from0", from_spec()),
            ("range1", range_spec(0, 100)),
            (
                "min2",
                OperationSpec::Min(MinOpSpec::default()),
            ),
            ("limit3", OperationSpec::Limit(LimitOpSpec { n: 5 })),
        ]);
        let lp = create_logical_plan(&q).unwrap();
        let p = plan(&lp, Time(0)).unwrap();
        assert!(p.procedures.contains_key(&ProcedureId::from("limit3")));
        assert!(p.warnings.iter().any(|w| w.contains("limit3")));
        let ProcedureSpec::Selector(sel) = &p.procedures[&ProcedureId::from("min2")].spec else {
            panic!("expected selector");
        };
        assert_eq!(sel.kind, SelectorKind::Min);
    }

    #[test]
    fn select_without_range_is_a_plan_error() {
        let q = chain(vec![("from0", from_spec())]);
        let lp = create_logical_plan(&q).unwrap();
        assert!(plan(&lp, Time(0)).is_err());
    }

    #[test]
    fn join_keeps_both_parents() {
        let mut q = chain(vec![("from0", from_spec()), ("range1", range_spec(0, 10))]);
        let mut q2 = chain(vec![("from2", from_spec()), ("range3", range_spec(0, 10))]);
        q.operations.append(&mut q2.operations);
        q.edges.append(&mut q2.edges);
        q.operations.push(Operation {
            id: "join4".into(),
            spec: OperationSpec::Join(JoinOpSpec {
                on: vec!["host".into()],
                expression: ifql_ast::ArrowFunctionExpression {
                    params: vec![ifql_ast::Identifier::new("a"), ifql_ast::Identifier::new("b")],
                    body: Expression::ident("a"),
                },
            }),
        });
        q.edges.push(Edge {
            parent: "range1".into(),
            child: "join4".into(),
        });
        q.edges.push(Edge {
            parent: "range3".into(),
            child: "join4".into(),
        });

        let lp = create_logical_plan(&q).unwrap();
        let p = plan(&lp, Time(0)).unwrap();
        let join = &p.procedures[&ProcedureId::from("join4")];
        assert_eq!(
            join.parents,
            vec![ProcedureId::from("from0"), ProcedureId::from("from2")]
        );
        assert_eq!(p.results, vec![ProcedureId::from("join4")]);
    }
}
