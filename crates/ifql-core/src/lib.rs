//! ifql-core: the shared vocabulary of the IFQL engine.
//!
//! Time and bounds, the columnar block model, the operation graph
//! (`QuerySpec`), strongly-typed identifiers, engine configuration, and the
//! canonical error enum live here so every other crate can depend on the
//! data model without pulling in the parser or the execution engine.

pub mod block;
pub mod config;
pub mod error;
pub mod id;
pub mod ops;
pub mod spec;
pub mod time;
pub mod values;

pub use block::{Block, ColKind, ColMeta, TIME_COL_LABEL, VALUE_COL_LABEL};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use id::DatasetId;
pub use ops::OperationSpec;
pub use spec::{Edge, Operation, OperationId, QuerySpec};
pub use time::{Bounds, BoundsSpec, Duration, OpTime, Time};
pub use values::{DataType, Value};
