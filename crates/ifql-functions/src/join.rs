//! `join(tables:[a,b], on:[…], f:(a,b) => …)`: inner merge join of two
//! streams. The tables become the operation's parents in declared order;
//! chaining a join onto a table is an error.

use std::sync::Arc;

use ifql_core::id::DatasetId;
use ifql_core::ops::{JoinOpSpec, OperationSpec};
use ifql_core::{Error, Result};
use ifql_exec::{
    Dataset, ExecutionContext, MergeJoinCache, MergeJoinTransformation, TransformationNode,
};
use ifql_lang::{Arguments, BuilderContext};
use ifql_plan::procedure::MergeJoinProcedureSpec;

pub const KIND: &str = "join";

pub fn create_op_spec(args: &mut Arguments, ctx: &mut BuilderContext) -> Result<OperationSpec> {
    if ctx.chained {
        return Err(Error::Argument(
            "join must list its inputs in the tables argument, not be chained".into(),
        ));
    }
    let tables = args.required_tables("tables")?;
    if tables.len() != 2 {
        return Err(Error::Argument(format!(
            "join requires exactly two tables, got {}",
            tables.len()
        )));
    }
    ctx.extra_parents = tables;

    let expression = args.required_function("f")?;
    if expression.params.len() != 2 {
        return Err(Error::Argument(
            "join function must take exactly two parameters".into(),
        ));
    }
    Ok(OperationSpec::Join(JoinOpSpec {
        on: args.optional_string_array("on")?.unwrap_or_default(),
        expression,
    }))
}

pub(crate) fn create_transformation(
    spec: &MergeJoinProcedureSpec,
    id: DatasetId,
    parents: &[DatasetId],
    cx: &ExecutionContext,
) -> Result<TransformationNode> {
    let cache = MergeJoinCache::new(cx.alloc.clone(), &spec.expression, spec.on.clone())?;
    let dataset = Dataset::new(id, Default::default(), cache);
    let t = MergeJoinTransformation::new(dataset.clone(), parents)?;
    Ok(TransformationNode {
        transformation: Arc::new(t),
        node: dataset,
    })
}
