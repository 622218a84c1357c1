//! `last(useStartTime:…, useRowTime:…)`: the last row of each partition.

use ifql_core::ops::{LastOpSpec, OperationSpec};
use ifql_core::Result;
use ifql_exec::IndexSelector;
use ifql_lang::{Arguments, BuilderContext};

use crate::selector_options;

pub const KIND: &str = "last";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    Ok(OperationSpec::Last(LastOpSpec {
        options: selector_options(args)?,
    }))
}

/// Every block's final row replaces the selection, so the last row seen
/// before the trigger fires wins.
#[derive(Default)]
pub struct LastSelector {}

impl IndexSelector for LastSelector {
    fn choose(&mut self, num_rows: usize) -> Option<usize> {
        num_rows.checked_sub(1)
    }
}
