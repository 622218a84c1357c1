//! `where(exp:{…})`: restrict rows by a predicate.
//!
//! Like range, where only exists as a pushdown into select; storage
//! evaluates the predicate per row.

use ifql_core::ops::{OperationSpec, WhereOpSpec};
use ifql_core::Result;
use ifql_lang::{Arguments, BuilderContext};

pub const KIND: &str = "where";

pub fn create_op_spec(args: &mut Arguments, _ctx: &mut BuilderContext) -> Result<OperationSpec> {
    Ok(OperationSpec::Where(WhereOpSpec {
        predicate: args.required_predicate("exp")?,
    }))
}
