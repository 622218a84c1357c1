//! `first(useStartTime:…, useRowTime:…)`: the first row of each
//! partition.

use ifql_core::ops::{FirstOpSpec, OperationSpec};
use ifql_core::Result;
use ifql_exec::IndexSelector;
use ifql_lang::{Arguments, BuilderContext};

use crate::selector_options;

pub const KIND: &str = "first";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    Ok(OperationSpec::First(FirstOpSpec {
        options: selector_options(args)?,
    }))
}

#[derive(Default)]
pub struct FirstSelector {
    chosen: bool,
}

impl IndexSelector for FirstSelector {
    fn choose(&mut self, num_rows: usize) -> Option<usize> {
        if self.chosen || num_rows == 0 {
            return None;
        }
        self.chosen = true;
        Some(0)
    }
}
