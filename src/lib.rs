//! IFQL: a chainable time-series query language compiled to a dataflow
//! plan and executed by a push-based streaming engine.
//!
//! The facade crate re-exports the pipeline stages and offers the whole
//! path in two calls:
//!
//! ```
//! use std::sync::Arc;
//! use ifql::{compile, execute};
//! use ifql_core::block::{Block, ColMeta, VALUE_COL_LABEL};
//! use ifql_core::time::{Bounds, Time};
//! use ifql_core::values::{DataType, Value};
//! use ifql_exec::MemoryStorage;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let mut block = Block::new(
//!     Bounds::new(Time(0), Time(10)),
//!     vec![ColMeta::time(), ColMeta::value(VALUE_COL_LABEL, DataType::Float)],
//! );
//! block.push_row(vec![Value::Time(Time(1)), Value::Float(1.0)]);
//! storage.insert("mydb", block);
//!
//! let plan = compile(r#"from(db:"mydb").range(start:0, stop:10).count()"#, Time(100)).unwrap();
//! let results = execute(&plan, storage, &Default::default()).unwrap();
//! assert_eq!(results[0].blocks[0].num_rows(), 1);
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use ifql_core::{
    Block, Bounds, ColKind, ColMeta, DataType, Duration, EngineConfig, Error, OpTime, Operation,
    OperationId, OperationSpec, QuerySpec, Result, Time, Value,
};
pub use ifql_exec::{MemoryStorage, QueryResult, StorageReader};
pub use ifql_functions::{default_registry, ExecutionRegistry};
pub use ifql_lang::{build_query, parse};
pub use ifql_plan::{create_logical_plan, plan, PlanSpec};

/// Parse, build, and plan a query against the default function registry.
pub fn compile(source: &str, now: Time) -> Result<PlanSpec> {
    let program = parse(source)?;
    let registry = default_registry();
    let query = build_query(&program, &registry)?;
    let logical = create_logical_plan(&query)?;
    plan(&logical, now)
}

/// Execute a compiled plan against a storage reader.
pub fn execute(
    plan: &PlanSpec,
    reader: Arc<dyn StorageReader>,
    config: &EngineConfig,
) -> Result<Vec<QueryResult>> {
    let registry = ExecutionRegistry::new();
    ifql_exec::execute(
        plan,
        &registry,
        reader,
        config,
        Arc::new(AtomicBool::new(false)),
    )
}

/// Parse and evaluate source text to an operation graph without planning,
/// for spec inspection and serialization.
pub fn compile_spec(source: &str) -> Result<QuerySpec> {
    let program = parse(source)?;
    let registry = default_registry();
    build_query(&program, &registry)
}
