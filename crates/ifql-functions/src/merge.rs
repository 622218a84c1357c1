//! `merge(keys:[…])`: re-group series under a new common-tag key set.

use std::sync::Arc;

use ifql_core::id::DatasetId;
use ifql_core::ops::{MergeOpSpec, OperationSpec};
use ifql_core::Result;
use ifql_exec::{
    BlockBuilderCache, Dataset, ExecutionContext, MergeTransformation, TransformationNode,
};
use ifql_lang::{Arguments, BuilderContext};
use ifql_plan::procedure::MergeProcedureSpec;

pub const KIND: &str = "merge";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    Ok(OperationSpec::Merge(MergeOpSpec {
        keys: args.optional_string_array("keys")?.unwrap_or_default(),
    }))
}

pub(crate) fn create_transformation(
    spec: &MergeProcedureSpec,
    id: DatasetId,
    parents: &[DatasetId],
    cx: &ExecutionContext,
) -> Result<TransformationNode> {
    let dataset = Dataset::new(
        id,
        Default::default(),
        BlockBuilderCache::new(cx.alloc.clone()),
    );
    let t = MergeTransformation::new(dataset.clone(), parents, spec.keys.clone());
    Ok(TransformationNode {
        transformation: Arc::new(t),
        node: dataset,
    })
}
