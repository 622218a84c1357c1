//! `limit(n:…)`: cap the number of rows read per series. Pushes into
//! select through range and where.

use ifql_core::ops::{LimitOpSpec, OperationSpec};
use ifql_core::Result;
use ifql_lang::{Arguments, BuilderContext};

pub const KIND: &str = "limit";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    Ok(OperationSpec::Limit(LimitOpSpec {
        n: args.required_u64("n")?,
    }))
}
