//! `count()`: number of rows per window.

use ifql_core::ops::{CountOpSpec, OperationSpec};
use ifql_core::values::{DataType, Value};
use ifql_core::{Error, Result};
use ifql_exec::ValueAggregator;
use ifql_lang::{Arguments, BuilderContext};

pub const KIND: &str = "count";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    if !args.is_empty() {
        return Err(Error::Argument("count function requires no arguments".into()));
    }
    Ok(OperationSpec::Count(CountOpSpec {}))
}

#[derive(Default)]
pub struct CountAgg {
    n: i64,
}

impl ValueAggregator for CountAgg {
    fn feed(&mut self, vs: &[f64]) {
        self.n += vs.len() as i64;
    }

    fn value(&self) -> Value {
        Value::Int(self.n)
    }

    fn output_type(&self) -> DataType {
        DataType::Int
    }

    fn reset(&mut self) {
        self.n = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_rows() {
        let mut agg = CountAgg::default();
        agg.feed(&[1.0, 2.0, 3.0]);
        agg.feed(&[4.0]);
        assert_eq!(agg.value(), Value::Int(4));
        agg.reset();
        assert_eq!(agg.value(), Value::Int(0));
    }
}
