//! ifql-functions: the concrete function kinds.
//!
//! One module per kind. Each wires up to three layers: argument
//! validation into an operation spec, and for executable kinds, the
//! creation of a source or transformation. The `FunctionRegistry` drives
//! the query builder; the `ExecutionRegistry` drives the executor.

pub mod count;
pub mod filter;
pub mod first;
pub mod from;
pub mod join;
pub mod last;
pub mod limit;
pub mod max;
pub mod mean;
pub mod merge;
pub mod min;
pub mod range;
pub mod stddev;
pub mod sum;
pub mod window;

use std::sync::Arc;

use ifql_core::id::DatasetId;
use ifql_core::ops::SelectorOptions;
use ifql_core::{Error, Result};
use ifql_exec::{
    AggregateCache, AggregateTransformation, Dataset, ExecutionContext, IndexSelector,
    IndexSelectorTransformation, NodeFactory, RowSelector, RowSelectorTransformation,
    SelectorCache, SelectorConfig, SourceNode, StorageReader, Transformation, TransformationNode,
};
use ifql_lang::FunctionRegistry;
use ifql_plan::{AggregateKind, Procedure, ProcedureSpec, SelectorKind};

/// Registry with every built-in kind registered.
pub fn default_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    let entries: &[(&str, ifql_lang::CreateOperationSpec)] = &[
        (from::KIND, from::create_op_spec),
        (range::KIND, range::create_op_spec),
        (filter::KIND, filter::create_op_spec),
        (limit::KIND, limit::create_op_spec),
        (window::KIND, window::create_op_spec),
        (merge::KIND, merge::create_op_spec),
        (join::KIND, join::create_op_spec),
        (count::KIND, count::create_op_spec),
        (sum::KIND, sum::create_op_spec),
        (mean::KIND, mean::create_op_spec),
        (stddev::KIND, stddev::create_op_spec),
        (min::KIND, min::create_op_spec),
        (max::KIND, max::create_op_spec),
        (first::KIND, first::create_op_spec),
        (last::KIND, last::create_op_spec),
    ];
    for (name, f) in entries {
        // A duplicate here is a programming error in this module list.
        if let Err(e) = registry.register(name, *f) {
            unreachable!("builtin registration failed: {e}");
        }
    }
    registry
}

/// Executor-side dispatch from procedure specs to sources and
/// transformations.
#[derive(Default)]
pub struct ExecutionRegistry;

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl NodeFactory for ExecutionRegistry {
    fn create_source(
        &self,
        procedure: &Procedure,
        id: DatasetId,
        reader: &Arc<dyn StorageReader>,
        cx: &ExecutionContext,
    ) -> Result<Option<Arc<dyn SourceNode>>> {
        match &procedure.spec {
            ProcedureSpec::Select(select) => {
                Ok(Some(from::create_source(select, id, reader.clone(), cx)))
            }
            _ => Ok(None),
        }
    }

    fn create_transformation(
        &self,
        procedure: &Procedure,
        id: DatasetId,
        parents: &[DatasetId],
        cx: &ExecutionContext,
    ) -> Result<TransformationNode> {
        match &procedure.spec {
            ProcedureSpec::Aggregate(agg) => {
                let factory: ifql_exec::aggregate::AggregatorFactory = match agg.kind {
                    AggregateKind::Count => Box::new(|| Box::new(count::CountAgg::default())),
                    AggregateKind::Sum => Box::new(|| Box::new(sum::SumAgg::default())),
                    AggregateKind::Mean => Box::new(|| Box::new(mean::MeanAgg::default())),
                    AggregateKind::Stddev => Box::new(|| Box::new(stddev::StddevAgg::default())),
                };
                let cache = AggregateCache::new(cx.alloc.clone(), factory);
                let dataset = Dataset::new(id, Default::default(), cache);
                let t = AggregateTransformation::new(dataset.clone(), parents);
                Ok(TransformationNode {
                    transformation: Arc::new(t),
                    node: dataset,
                })
            }
            ProcedureSpec::Selector(sel) => {
                let config = selector_config(&sel.options);
                let cache = SelectorCache::new(cx.alloc.clone(), config.clone());
                let dataset = Dataset::new(id, Default::default(), cache);
                let t: Arc<dyn Transformation> = match sel.kind {
                    SelectorKind::Min => Arc::new(RowSelectorTransformation::new(
                        dataset.clone(),
                        parents,
                        Box::new(|| Box::new(min::MinSelector::default()) as Box<dyn RowSelector>),
                        &config,
                    )),
                    SelectorKind::Max => Arc::new(RowSelectorTransformation::new(
                        dataset.clone(),
                        parents,
                        Box::new(|| Box::new(max::MaxSelector::default()) as Box<dyn RowSelector>),
                        &config,
                    )),
                    SelectorKind::First => Arc::new(IndexSelectorTransformation::new(
                        dataset.clone(),
                        parents,
                        Box::new(|| {
                            Box::new(first::FirstSelector::default()) as Box<dyn IndexSelector>
                        }),
                        &config,
                    )),
                    SelectorKind::Last => Arc::new(IndexSelectorTransformation::new(
                        dataset.clone(),
                        parents,
                        Box::new(|| {
                            Box::new(last::LastSelector::default()) as Box<dyn IndexSelector>
                        }),
                        &config,
                    )),
                };
                Ok(TransformationNode {
                    transformation: t,
                    node: dataset,
                })
            }
            ProcedureSpec::Window(w) => window::create_transformation(w, id, parents, cx),
            ProcedureSpec::Merge(m) => merge::create_transformation(m, id, parents, cx),
            ProcedureSpec::Join(j) => join::create_transformation(j, id, parents, cx),
            other => Err(Error::Plan(format!(
                "no transformation registered for procedure kind {:?}",
                other.kind()
            ))),
        }
    }
}

fn selector_config(options: &SelectorOptions) -> SelectorConfig {
    SelectorConfig {
        column: options.column.clone(),
        use_start_time: options.use_start_time,
        use_row_time: options.use_row_time,
    }
}

/// Shared argument surface of the selector kinds.
pub(crate) fn selector_options(args: &mut ifql_lang::Arguments) -> Result<SelectorOptions> {
    Ok(SelectorOptions {
        column: args.optional_string("column")?,
        use_start_time: args.optional_bool("useStartTime")?.unwrap_or(false),
        use_row_time: args.optional_bool("useRowTime")?.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifql_exec::ValueAggregator;

    #[test]
    fn default_registry_knows_all_kinds() {
        let registry = default_registry();
        for kind in [
            "from", "range", "where", "limit", "window", "merge", "join", "count", "sum", "mean",
            "stddev", "min", "max", "first", "last",
        ] {
            assert!(registry.get(kind).is_some(), "missing kind {kind}");
        }
    }

    #[test]
    fn agg_smoke() {
        let mut agg = stddev::StddevAgg::default();
        agg.feed(&[1.0, 2.0, 3.0, 4.0]);
        let ifql_core::values::Value::Float(v) = agg.value() else {
            panic!("expected float");
        };
        assert!((v - (5.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }
}
