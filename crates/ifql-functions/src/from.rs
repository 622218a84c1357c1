//! `from(db:"name")`: the storage read, rooting every chain.

use std::sync::Arc;

use ifql_core::id::DatasetId;
use ifql_core::ops::{FromOpSpec, OperationSpec};
use ifql_core::{Error, Result};
use ifql_exec::{ExecutionContext, ReadSpec, SourceNode, StorageReader, StorageSource, Window};
use ifql_lang::{Arguments, BuilderContext};
use ifql_plan::SelectProcedureSpec;

pub const KIND: &str = "from";

pub fn create_op_spec(args: &mut Arguments, ctx: &mut BuilderContext) -> Result<OperationSpec> {
    if ctx.chained {
        return Err(Error::Argument(
            "from cannot be chained onto another operation".into(),
        ));
    }
    Ok(OperationSpec::From(FromOpSpec {
        database: args.required_string("db")?,
    }))
}

/// Build the storage source for a planned select. The read window covers
/// the whole resolved bounds in one pass.
pub fn create_source(
    select: &SelectProcedureSpec,
    id: DatasetId,
    reader: Arc<dyn StorageReader>,
    cx: &ExecutionContext,
) -> Arc<dyn SourceNode> {
    let bounds = select.bounds.resolve(cx.now);
    let read_spec = ReadSpec {
        database: select.database.clone(),
        predicate: select.predicate.clone(),
        limit: select.limit,
        group_keys: Vec::new(),
        group_except: Vec::new(),
        merge_all: false,
    };
    let window = Window {
        every: bounds.duration(),
        period: bounds.duration(),
    };
    StorageSource::new(id, reader, read_spec, bounds, window)
}
