#![forbid(unsafe_code)]
//! ifql-exec: the streaming execution engine.
//!
//! Sources emit time-bounded blocks into transformations; transformations
//! build output blocks in partition-keyed caches under a shared memory
//! allocator; triggers decide when a partition's builder seals into an
//! immutable block for the next stage. Watermarks flow downstream as the
//! minimum across parents. One OS thread runs per source; everything else
//! executes on the calling parent's thread under per-dataset locks.

pub mod aggregate;
pub mod alloc;
pub mod block;
pub mod cache;
pub mod dataset;
pub mod executor;
pub mod join;
pub mod merge;
pub mod predicate;
pub mod selector;
pub mod source;
pub mod storage;
pub mod transformation;
pub mod trigger;
pub mod window;

pub use aggregate::{AggregateCache, AggregateTransformation, AggregatorFactory, ValueAggregator};
pub use alloc::{AllocGuard, Allocator};
pub use block::{BlockBuilder, PartitionKey};
pub use cache::BlockBuilderCache;
pub use dataset::{DataCache, Dataset, Node};
pub use executor::{
    execute, ExecutionContext, NodeFactory, QueryResult, ResultSink, TransformationNode,
};
pub use join::{MergeJoinCache, MergeJoinTransformation};
pub use merge::MergeTransformation;
pub use selector::{
    IndexSelector, IndexSelectorTransformation, RowSelector, RowSelectorTransformation,
    SelectorCache, SelectorConfig,
};
pub use source::{SourceNode, StorageSource, Window};
pub use storage::{BlockIterator, MemoryStorage, ReadSpec, StorageReader};
pub use transformation::{ParentState, Transformation};
pub use trigger::{Trigger, TriggerContext, TriggerSpec};
pub use window::WindowTransformation;

use std::sync::{Mutex, MutexGuard};

/// Poison-tolerant lock. A panicking operator is converted to an error at
/// the source thread boundary; state behind the lock stays usable.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
