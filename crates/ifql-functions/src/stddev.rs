//! `stddev()`: sample standard deviation per window, computed online with
//! Welford's algorithm. Fewer than two observations yield NaN.

use ifql_core::ops::{OperationSpec, StddevOpSpec};
use ifql_core::values::Value;
use ifql_core::{Error, Result};
use ifql_exec::ValueAggregator;
use ifql_lang::{Arguments, BuilderContext};

pub const KIND: &str = "stddev";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    if !args.is_empty() {
        return Err(Error::Argument(
            "stddev function requires no arguments".into(),
        ));
    }
    Ok(OperationSpec::Stddev(StddevOpSpec {}))
}

#[derive(Default)]
pub struct StddevAgg {
    n: f64,
    mean: f64,
    m2: f64,
}

impl ValueAggregator for StddevAgg {
    fn feed(&mut self, vs: &[f64]) {
        for &v in vs {
            self.n += 1.0;
            let delta = v - self.mean;
            self.mean += delta / self.n;
            let delta2 = v - self.mean;
            self.m2 += delta * delta2;
        }
    }

    fn value(&self) -> Value {
        if self.n < 2.0 {
            return Value::Float(f64::NAN);
        }
        Value::Float((self.m2 / (self.n - 1.0)).sqrt())
    }

    fn reset(&mut self) {
        self.n = 0.0;
        self.mean = 0.0;
        self.m2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_point_sample() {
        let mut agg = StddevAgg::default();
        agg.feed(&[1.0, 2.0, 3.0, 4.0]);
        let Value::Float(v) = agg.value() else {
            panic!("expected float");
        };
        assert!((v - 1.2909944487358056).abs() < 1e-12);
    }

    #[test]
    fn under_two_observations_is_nan() {
        let mut agg = StddevAgg::default();
        agg.feed(&[42.0]);
        let Value::Float(v) = agg.value() else {
            panic!("expected float");
        };
        assert!(v.is_nan());
    }

    #[test]
    fn feeding_in_chunks_matches_one_shot() {
        let mut a = StddevAgg::default();
        a.feed(&[1.0, 2.0, 3.0, 4.0]);
        let mut b = StddevAgg::default();
        b.feed(&[1.0, 2.0]);
        b.feed(&[3.0]);
        b.feed(&[4.0]);
        let (Value::Float(x), Value::Float(y)) = (a.value(), b.value()) else {
            panic!("expected floats");
        };
        assert!((x - y).abs() < 1e-12);
    }
}
