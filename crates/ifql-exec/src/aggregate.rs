//! Aggregate transformations: fold a partition's value vectors into one
//! output row per window.
//!
//! Each incoming block feeds its raw value column into the partition's
//! aggregator. When the partition's trigger fires, the aggregator's value
//! becomes a single row at the window's stop time and the state clears.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ifql_core::block::{Block, ColKind, ColMeta, VALUE_COL_LABEL};
use ifql_core::id::DatasetId;
use ifql_core::time::Time;
use ifql_core::values::{DataType, Value};
use ifql_core::{Error, Result};

use crate::alloc::{AllocGuard, Allocator};
use crate::block::PartitionKey;
use crate::dataset::{DataCache, Dataset};
use crate::lock;
use crate::transformation::{ParentState, Transformation};

/// Online aggregation over the raw value vectors of one partition.
pub trait ValueAggregator: Send {
    fn feed(&mut self, vs: &[f64]);
    fn value(&self) -> Value;
    fn output_type(&self) -> DataType {
        DataType::Float
    }
    fn reset(&mut self);
}

pub type AggregatorFactory = Box<dyn Fn() -> Box<dyn ValueAggregator> + Send + Sync>;

struct AggEntry {
    tag_cols: Vec<ColMeta>,
    agg: Box<dyn ValueAggregator>,
    _guard: AllocGuard,
}

/// Aggregator state per partition key; seals to a one-row block.
pub struct AggregateCache {
    alloc: Allocator,
    factory: AggregatorFactory,
    entries: Mutex<HashMap<PartitionKey, AggEntry>>,
}

/// Accounted per aggregator; their state is O(1).
const AGG_STATE_BYTES: usize = 64;

impl AggregateCache {
    pub fn new(alloc: Allocator, factory: AggregatorFactory) -> Self {
        Self {
            alloc,
            factory,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn feed(&self, key: &PartitionKey, tag_cols: &[ColMeta], vs: &[f64]) -> Result<()> {
        let mut entries = lock(&self.entries);
        let entry = match entries.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => e.insert(AggEntry {
                tag_cols: tag_cols.to_vec(),
                agg: (self.factory)(),
                _guard: self.alloc.account(AGG_STATE_BYTES)?,
            }),
        };
        entry.agg.feed(vs);
        Ok(())
    }
}

impl DataCache for AggregateCache {
    fn partition_keys(&self) -> Vec<PartitionKey> {
        lock(&self.entries).keys().cloned().collect()
    }

    fn build(&self, key: &PartitionKey) -> Result<Block> {
        let mut entries = lock(&self.entries);
        let Some(entry) = entries.get_mut(key) else {
            return Ok(Block::new(key.bounds, Vec::new()));
        };
        let mut cols = vec![
            ColMeta::time(),
            ColMeta::value(VALUE_COL_LABEL, entry.agg.output_type()),
        ];
        cols.extend(entry.tag_cols.iter().cloned());

        let mut block = Block::new(key.bounds, cols);
        let mut row = vec![Value::Time(key.bounds.stop), entry.agg.value()];
        for col in &entry.tag_cols {
            let v = key.tag(&col.label).unwrap_or_default();
            row.push(Value::Str(v.to_string()));
        }
        block.push_row(row);
        entry.agg.reset();
        Ok(block)
    }

    fn expire(&self, key: &PartitionKey) {
        lock(&self.entries).remove(key);
    }
}

pub struct AggregateTransformation {
    dataset: Arc<Dataset<AggregateCache>>,
    parents: ParentState,
}

impl AggregateTransformation {
    pub fn new(dataset: Arc<Dataset<AggregateCache>>, parents: &[DatasetId]) -> Self {
        Self {
            dataset,
            parents: ParentState::new(parents),
        }
    }
}

impl Transformation for AggregateTransformation {
    fn process(&self, _parent: DatasetId, block: &Block) -> Result<()> {
        let key = PartitionKey::from_block(block);
        let tag_cols: Vec<ColMeta> = block
            .cols
            .iter()
            .filter(|c| c.kind == ColKind::Tag && c.common)
            .cloned()
            .collect();
        let value_idx = block
            .value_col_index(None)
            .ok_or_else(|| Error::Type("aggregate input block has no value column".into()))?;
        let vs: Vec<f64> = block.data[value_idx]
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| Error::Type(format!("non-numeric value {v} in value column")))
            })
            .collect::<Result<_>>()?;
        self.dataset.cache().feed(&key, &tag_cols, &vs)?;
        self.dataset.trigger_updates()
    }

    fn retract_block(&self, _parent: DatasetId, key: &PartitionKey) -> Result<()> {
        self.dataset.retract(key)
    }

    fn update_watermark(&self, parent: DatasetId, t: Time) -> Result<()> {
        let min = self.parents.update_watermark(parent, t);
        self.dataset.update_watermark(min)
    }

    fn update_processing_time(&self, _parent: DatasetId, t: Time) -> Result<()> {
        let latest = self.parents.update_processing_time(t);
        self.dataset.update_processing_time(latest)
    }

    fn finish(&self, parent: DatasetId, err: Option<Error>) {
        if let Some(err) = self.parents.finish(parent, err) {
            self.dataset.finish(err);
        }
    }
}
