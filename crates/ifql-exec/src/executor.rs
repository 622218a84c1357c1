//! Executor: build the dataset graph from a physical plan and run it.
//!
//! Nodes are created bottom-up in plan order; each procedure becomes
//! either a source or a transformation plus its dataset, wired to its
//! parents' nodes. Terminal datasets get a result sink. Every source runs
//! on its own OS thread; panics in operator code are caught at the thread
//! boundary and converted to errors that finish the source's subtree.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use ifql_core::block::Block;
use ifql_core::config::EngineConfig;
use ifql_core::id::DatasetId;
use ifql_core::time::Time;
use ifql_core::{Error, Result};
use ifql_plan::{PlanSpec, Procedure, ProcedureId};

use crate::alloc::Allocator;
use crate::block::PartitionKey;
use crate::dataset::Node;
use crate::lock;
use crate::source::SourceNode;
use crate::storage::StorageReader;
use crate::transformation::Transformation;

/// Shared execution state: the query's `now`, the memory allocator, and
/// the cancellation flag checked per window and per process call.
pub struct ExecutionContext {
    pub now: Time,
    pub alloc: Allocator,
    cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(now: Time, alloc: Allocator, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            now,
            alloc,
            cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A transformation plus the node handle other procedures wire into.
pub struct TransformationNode {
    pub transformation: Arc<dyn Transformation>,
    pub node: Arc<dyn Node>,
}

/// Creates concrete sources and transformations for procedure specs. The
/// registry of kinds implements this; the executor stays agnostic of the
/// concrete operator set.
pub trait NodeFactory: Send + Sync {
    /// `Some` when the procedure reads externally and roots the dataflow.
    fn create_source(
        &self,
        procedure: &Procedure,
        id: DatasetId,
        reader: &Arc<dyn StorageReader>,
        cx: &ExecutionContext,
    ) -> Result<Option<Arc<dyn SourceNode>>>;

    fn create_transformation(
        &self,
        procedure: &Procedure,
        id: DatasetId,
        parents: &[DatasetId],
        cx: &ExecutionContext,
    ) -> Result<TransformationNode>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub name: ProcedureId,
    pub blocks: Vec<Block>,
}

/// Collects the blocks of one terminal dataset.
pub struct ResultSink {
    inner: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    blocks: Vec<Block>,
    err: Option<Error>,
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SinkState::default()),
        }
    }

    /// Blocks in deterministic order, and the first error observed.
    pub fn take(&self) -> (Vec<Block>, Option<Error>) {
        let mut state = lock(&self.inner);
        let mut blocks = std::mem::take(&mut state.blocks);
        blocks.sort_by_key(|b| b.sort_key());
        (blocks, state.err.clone())
    }
}

impl Transformation for ResultSink {
    fn process(&self, _parent: DatasetId, block: &Block) -> Result<()> {
        lock(&self.inner).blocks.push(block.clone());
        Ok(())
    }

    fn retract_block(&self, _parent: DatasetId, key: &PartitionKey) -> Result<()> {
        lock(&self.inner)
            .blocks
            .retain(|b| &PartitionKey::from_block(b) != key);
        Ok(())
    }

    fn update_watermark(&self, _parent: DatasetId, _t: Time) -> Result<()> {
        Ok(())
    }

    fn update_processing_time(&self, _parent: DatasetId, _t: Time) -> Result<()> {
        Ok(())
    }

    fn finish(&self, _parent: DatasetId, err: Option<Error>) {
        let mut state = lock(&self.inner);
        if state.err.is_none() {
            state.err = err;
        }
    }
}

enum NodeHandle {
    Source(Arc<dyn SourceNode>),
    Dataset(Arc<dyn Node>),
}

impl NodeHandle {
    fn add_transformation(&self, t: Arc<dyn Transformation>) {
        match self {
            NodeHandle::Source(s) => s.add_transformation(t),
            NodeHandle::Dataset(d) => d.add_transformation(t),
        }
    }
}

/// Run a plan to completion and return the blocks of every result, in the
/// plan's result order.
pub fn execute(
    plan: &PlanSpec,
    factory: &dyn NodeFactory,
    reader: Arc<dyn StorageReader>,
    config: &EngineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<Vec<QueryResult>> {
    let cx = ExecutionContext::new(plan.now, Allocator::new(config.mem_cap_bytes), cancelled);

    let mut dataset_ids: HashMap<ProcedureId, DatasetId> = HashMap::new();
    let mut nodes: HashMap<ProcedureId, NodeHandle> = HashMap::new();
    let mut sources: Vec<Arc<dyn SourceNode>> = Vec::new();

    for (index, pid) in plan.order.iter().enumerate() {
        let Some(procedure) = plan.procedure(pid) else {
            continue;
        };
        let id = DatasetId::new(index as u64);
        dataset_ids.insert(pid.clone(), id);

        if let Some(source) = factory.create_source(procedure, id, &reader, &cx)? {
            sources.push(source.clone());
            nodes.insert(pid.clone(), NodeHandle::Source(source));
            continue;
        }

        let parent_ids: Vec<DatasetId> = procedure
            .parents
            .iter()
            .filter_map(|p| dataset_ids.get(p).copied())
            .collect();
        let tn = factory.create_transformation(procedure, id, &parent_ids, &cx)?;
        for parent in &procedure.parents {
            if let Some(node) = nodes.get(parent) {
                node.add_transformation(tn.transformation.clone());
            }
        }
        nodes.insert(pid.clone(), NodeHandle::Dataset(tn.node));
    }

    let mut sinks: Vec<(ProcedureId, Arc<ResultSink>)> = Vec::new();
    for rid in &plan.results {
        let sink = Arc::new(ResultSink::new());
        if let Some(node) = nodes.get(rid) {
            node.add_transformation(sink.clone());
        }
        sinks.push((rid.clone(), sink));
    }

    debug!(
        sources = sources.len(),
        procedures = plan.order.len(),
        "executing plan"
    );

    // One OS thread per source, bounded by the configured parallelism.
    let batch = config.max_source_threads.max(1);
    for group in sources.chunks(batch) {
        std::thread::scope(|scope| {
            for source in group {
                let cx = &cx;
                scope.spawn(move || {
                    let outcome = catch_unwind(AssertUnwindSafe(|| source.run(cx)));
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            error!(source = %source.id(), error = %e, "source failed");
                            source.finish_all(Some(e));
                        }
                        Err(payload) => {
                            let e = Error::Panic(panic_message(payload.as_ref()));
                            error!(source = %source.id(), error = %e, "source panicked");
                            source.finish_all(Some(e));
                        }
                    }
                });
            }
        });
    }

    if cx.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut results = Vec::with_capacity(sinks.len());
    for (name, sink) in sinks {
        let (blocks, err) = sink.take();
        if let Some(err) = err {
            return Err(err);
        }
        results.push(QueryResult { name, blocks });
    }
    Ok(results)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
