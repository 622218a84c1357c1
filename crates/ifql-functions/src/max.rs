//! `max(column:…, useStartTime:…, useRowTime:…)`: the row with the
//! largest value per partition.

use ifql_core::ops::{MaxOpSpec, OperationSpec};
use ifql_core::Result;
use ifql_exec::RowSelector;
use ifql_lang::{Arguments, BuilderContext};

use crate::selector_options;

pub const KIND: &str = "max";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    Ok(OperationSpec::Max(MaxOpSpec {
        options: selector_options(args)?,
    }))
}

#[derive(Default)]
pub struct MaxSelector {
    max: Option<f64>,
}

impl RowSelector for MaxSelector {
    fn select(&mut self, v: f64) -> bool {
        match self.max {
            Some(cur) if v <= cur => false,
            _ => {
                self.max = Some(v);
                true
            }
        }
    }
}
