//! `window(every:…, period:…, start:…)`: re-bucket rows by time.

use std::sync::Arc;

use ifql_core::id::DatasetId;
use ifql_core::ops::{OperationSpec, WindowOpSpec};
use ifql_core::time::OpTime;
use ifql_core::Result;
use ifql_exec::{
    BlockBuilderCache, Dataset, ExecutionContext, TransformationNode, WindowTransformation,
};
use ifql_lang::{Arguments, BuilderContext};
use ifql_plan::procedure::WindowProcedureSpec;

pub const KIND: &str = "window";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    let every = args.required_duration("every")?;
    let period = args.optional_duration("period")?.unwrap_or(every);
    let start = args.optional_time("start")?.unwrap_or_default();
    Ok(OperationSpec::Window(WindowOpSpec {
        every,
        period,
        start,
    }))
}

pub(crate) fn create_transformation(
    spec: &WindowProcedureSpec,
    id: DatasetId,
    parents: &[DatasetId],
    cx: &ExecutionContext,
) -> Result<TransformationNode> {
    let dataset = Dataset::new(
        id,
        Default::default(),
        BlockBuilderCache::new(cx.alloc.clone()),
    );
    let start = if spec.start == OpTime::default() {
        ifql_core::time::Time(0)
    } else {
        spec.start.resolve(cx.now)
    };
    let t = WindowTransformation::new(dataset.clone(), parents, spec.every, spec.period, start);
    Ok(TransformationNode {
        transformation: Arc::new(t),
        node: dataset,
    })
}
