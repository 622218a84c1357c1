//! Datasets: a transformation's output port and its cache of in-flight
//! partitions.
//!
//! The dataset owns the trigger evaluation loop. Watermark and processing
//! time advance under the dataset's own lock (never a global one); each
//! advance re-consults the trigger for every cached partition, seals the
//! ready ones, and pushes the sealed blocks to downstream transformations
//! on the calling thread.

use std::sync::{Arc, Mutex};

use tracing::trace;

use ifql_core::block::Block;
use ifql_core::id::DatasetId;
use ifql_core::time::Time;
use ifql_core::{Error, Result};

use crate::block::PartitionKey;
use crate::lock;
use crate::transformation::Transformation;
use crate::trigger::{TriggerContext, TriggerSpec};

/// Storage side of a dataset: partition-keyed state that can seal into
/// blocks. Implementations carry their own interior lock.
pub trait DataCache: Send + Sync {
    /// Keys with buffered state.
    fn partition_keys(&self) -> Vec<PartitionKey>;

    /// Seal the partition's current state into a block.
    fn build(&self, key: &PartitionKey) -> Result<Block>;

    /// Drop the partition's state.
    fn expire(&self, key: &PartitionKey);
}

/// Anything downstream transformations can be attached to: datasets and
/// sources.
pub trait Node: Send + Sync {
    fn add_transformation(&self, t: Arc<dyn Transformation>);
}

struct DatasetState {
    watermark: Time,
    processing_time: Time,
    finished: bool,
}

pub struct Dataset<C: DataCache> {
    id: DatasetId,
    trigger_spec: TriggerSpec,
    cache: C,
    state: Mutex<DatasetState>,
    ts: Mutex<Vec<Arc<dyn Transformation>>>,
}

impl<C: DataCache> Dataset<C> {
    pub fn new(id: DatasetId, trigger_spec: TriggerSpec, cache: C) -> Arc<Self> {
        Arc::new(Self {
            id,
            trigger_spec,
            cache,
            state: Mutex::new(DatasetState {
                watermark: Time::MIN,
                processing_time: Time::MIN,
                finished: false,
            }),
            ts: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    fn downstream(&self) -> Vec<Arc<dyn Transformation>> {
        lock(&self.ts).clone()
    }

    /// Re-evaluate triggers after cache mutation; called by the owning
    /// transformation from `process`.
    pub fn trigger_updates(&self) -> Result<()> {
        self.eval_triggers(false)
    }

    pub fn update_watermark(&self, t: Time) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if t > state.watermark {
                state.watermark = t;
            }
        }
        self.eval_triggers(false)?;
        for child in self.downstream() {
            child.update_watermark(self.id, t)?;
        }
        Ok(())
    }

    pub fn update_processing_time(&self, t: Time) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if t > state.processing_time {
                state.processing_time = t;
            }
        }
        self.eval_triggers(false)?;
        for child in self.downstream() {
            child.update_processing_time(self.id, t)?;
        }
        Ok(())
    }

    pub fn retract(&self, key: &PartitionKey) -> Result<()> {
        self.cache.expire(key);
        for child in self.downstream() {
            child.retract_block(self.id, key)?;
        }
        Ok(())
    }

    /// Flush everything still buffered and finish downstream. With an
    /// error, buffered partial results are discarded instead of flushed.
    pub fn finish(&self, err: Option<Error>) {
        {
            let mut state = lock(&self.state);
            if state.finished {
                return;
            }
            state.finished = true;
        }
        let mut err = err;
        if err.is_none() {
            if let Err(flush_err) = self.eval_triggers(true) {
                err = Some(flush_err);
            }
        }
        for child in self.downstream() {
            child.finish(self.id, err.clone());
        }
    }

    fn eval_triggers(&self, finished: bool) -> Result<()> {
        let (watermark, processing_time) = {
            let state = lock(&self.state);
            (state.watermark, state.processing_time)
        };
        let mut trigger = self.trigger_spec.create();
        for key in self.cache.partition_keys() {
            let cx = TriggerContext {
                bounds: key.bounds,
                watermark,
                processing_time,
                finished,
            };
            if !trigger.triggered(&cx) {
                continue;
            }
            let block = self.cache.build(&key)?;
            self.cache.expire(&key);
            if block.num_rows() == 0 {
                continue;
            }
            trace!(dataset = %self.id, bounds = %block.bounds, rows = block.num_rows(), "block sealed");
            for child in self.downstream() {
                child.process(self.id, &block)?;
            }
        }
        Ok(())
    }
}

impl<C: DataCache> Node for Dataset<C> {
    fn add_transformation(&self, t: Arc<dyn Transformation>) {
        lock(&self.ts).push(t);
    }
}
