//! `range(start:…, stop:…)`: restrict a chain to a time range.
//!
//! Range has no transformation of its own; the planner pushes it into its
//! select root, through limit and where.

use ifql_core::ops::{OperationSpec, RangeOpSpec};
use ifql_core::time::OpTime;
use ifql_core::Result;
use ifql_lang::{Arguments, BuilderContext};

pub const KIND: &str = "range";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    let start = args.required_time("start")?;
    let stop = args.optional_time("stop")?.unwrap_or_else(OpTime::now);
    Ok(OperationSpec::Range(RangeOpSpec { start, stop }))
}
