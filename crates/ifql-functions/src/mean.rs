//! `mean()`: arithmetic mean of values per window.

use ifql_core::ops::{MeanOpSpec, OperationSpec};
use ifql_core::values::Value;
use ifql_core::{Error, Result};
use ifql_exec::ValueAggregator;
use ifql_lang::{Arguments, BuilderContext};

pub const KIND: &str = "mean";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    if !args.is_empty() {
        return Err(Error::Argument("mean function requires no arguments".into()));
    }
    Ok(OperationSpec::Mean(MeanOpSpec {}))
}

#[derive(Default)]
pub struct MeanAgg {
    sum: f64,
    n: f64,
}

impl ValueAggregator for MeanAgg {
    fn feed(&mut self, vs: &[f64]) {
        self.sum += vs.iter().sum::<f64>();
        self.n += vs.len() as f64;
    }

    fn value(&self) -> Value {
        Value::Float(self.sum / self.n)
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.n = 0.0;
    }
}
