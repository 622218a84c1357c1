//! `sum()`: sum of values per window.

use ifql_core::ops::{OperationSpec, SumOpSpec};
use ifql_core::values::Value;
use ifql_core::{Error, Result};
use ifql_exec::ValueAggregator;
use ifql_lang::{Arguments, BuilderContext};

pub const KIND: &str = "sum";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    if !args.is_empty() {
        return Err(Error::Argument("sum function requires no arguments".into()));
    }
    Ok(OperationSpec::Sum(SumOpSpec {}))
}

#[derive(Default)]
pub struct SumAgg {
    sum: f64,
}

impl ValueAggregator for SumAgg {
    fn feed(&mut self, vs: &[f64]) {
        self.sum += vs.iter().sum::<f64>();
    }

    fn value(&self) -> Value {
        Value::Float(self.sum)
    }

    fn reset(&mut self) {
        self.sum = 0.0;
    }
}
