//! Sources: the leaves of the dataflow graph.
//!
//! The storage source walks its bounds window by window. Every block of a
//! window is pushed to each downstream transformation followed by a
//! processing-time update; draining a window advances the watermark to the
//! window's stop; exhausting the bounds finishes downstream.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use ifql_core::id::DatasetId;
use ifql_core::time::{Bounds, Duration, Time};
use ifql_core::{Error, Result};

use crate::dataset::Node;
use crate::executor::ExecutionContext;
use crate::lock;
use crate::storage::{BlockIterator, ReadSpec, StorageReader};
use crate::transformation::Transformation;

/// The read cadence: a window of `period` emitted every `every`.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub every: Duration,
    pub period: Duration,
}

/// A running source: drives blocks into its attached transformations.
pub trait SourceNode: Node {
    fn id(&self) -> DatasetId;

    /// Blocking; returns when the source's bounds are exhausted or on the
    /// first error. Does not finish downstream on error, the executor
    /// does that with the error attached.
    fn run(&self, cx: &ExecutionContext) -> Result<()>;

    fn finish_all(&self, err: Option<Error>);
}

pub struct StorageSource {
    id: DatasetId,
    reader: Arc<dyn StorageReader>,
    read_spec: ReadSpec,
    bounds: Bounds,
    window: Window,
    current: Mutex<Time>,
    ts: Mutex<Vec<Arc<dyn Transformation>>>,
}

impl StorageSource {
    pub fn new(
        id: DatasetId,
        reader: Arc<dyn StorageReader>,
        read_spec: ReadSpec,
        bounds: Bounds,
        window: Window,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            reader,
            read_spec,
            bounds,
            window,
            current: Mutex::new(bounds.start + window.period),
            ts: Mutex::new(Vec::new()),
        })
    }

    fn downstream(&self) -> Vec<Arc<dyn Transformation>> {
        lock(&self.ts).clone()
    }

    /// The next window's block iterator and its watermark, or `None` once
    /// past the bounds.
    fn next(&self) -> Result<Option<(Box<dyn BlockIterator>, Time)>> {
        let (start, stop) = {
            let mut current = lock(&self.current);
            let stop = *current;
            let start = stop - self.window.period;
            *current = stop + self.window.every;
            (start, stop)
        };
        if stop > self.bounds.stop {
            return Ok(None);
        }
        let iter = self.reader.read(&self.read_spec, start, stop)?;
        Ok(Some((iter, stop)))
    }
}

impl Node for StorageSource {
    fn add_transformation(&self, t: Arc<dyn Transformation>) {
        lock(&self.ts).push(t);
    }
}

impl SourceNode for StorageSource {
    fn id(&self) -> DatasetId {
        self.id
    }

    fn run(&self, cx: &ExecutionContext) -> Result<()> {
        loop {
            cx.check_cancelled()?;
            let Some((mut blocks, mark)) = self.next()? else {
                break;
            };
            while let Some(block) = blocks.next_block() {
                trace!(source = %self.id, bounds = %block.bounds, rows = block.num_rows(), "source block");
                for t in self.downstream() {
                    t.process(self.id, &block)?;
                    t.update_processing_time(self.id, wall_clock())?;
                }
            }
            for t in self.downstream() {
                t.update_watermark(self.id, mark)?;
            }
        }
        debug!(source = %self.id, "source exhausted");
        self.finish_all(None);
        Ok(())
    }

    fn finish_all(&self, err: Option<Error>) {
        for t in self.downstream() {
            t.finish(self.id, err.clone());
        }
    }
}

fn wall_clock() -> Time {
    let ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default();
    Time(ns)
}
