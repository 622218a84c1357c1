//! `min(column:…, useStartTime:…, useRowTime:…)`: the row with the
//! smallest value per partition.

use ifql_core::ops::{MinOpSpec, OperationSpec};
use ifql_core::Result;
use ifql_exec::RowSelector;
use ifql_lang::{Arguments, BuilderContext};

use crate::selector_options;

pub const KIND: &str = "min";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    Ok(OperationSpec::Min(MinOpSpec {
        options: selector_options(args)?,
    }))
}

#[derive(Default)]
pub struct MinSelector {
    min: Option<f64>,
}

impl RowSelector for MinSelector {
    fn select(&mut self, v: f64) -> bool {
        match self.min {
            Some(cur) if v >= cur => false,
            _ => {
                self.min = Some(v);
                true
            }
        }
    }
}
