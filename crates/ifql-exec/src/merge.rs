//! Merge transformation: re-group series under a new common-tag key set.
//!
//! The named keys become the partition's common tags; every other tag
//! demotes to a plain per-row column. Blocks whose resulting key matches
//! coalesce in the builder cache, which restores time order when sealing.

use std::sync::Arc;

use ifql_core::block::{Block, ColKind};
use ifql_core::id::DatasetId;
use ifql_core::time::Time;
use ifql_core::{Error, Result};

use crate::block::{cols_with_common, PartitionKey};
use crate::cache::BlockBuilderCache;
use crate::dataset::Dataset;
use crate::transformation::{ParentState, Transformation};

pub struct MergeTransformation {
    dataset: Arc<Dataset<BlockBuilderCache>>,
    parents: ParentState,
    keys: Vec<String>,
}

impl MergeTransformation {
    pub fn new(
        dataset: Arc<Dataset<BlockBuilderCache>>,
        parents: &[DatasetId],
        keys: Vec<String>,
    ) -> Self {
        Self {
            dataset,
            parents: ParentState::new(parents),
            keys,
        }
    }
}

impl Transformation for MergeTransformation {
    fn process(&self, _parent: DatasetId, block: &Block) -> Result<()> {
        let cols = cols_with_common(&block.cols, &self.keys);
        let key_indices: Vec<(String, usize)> = self
            .keys
            .iter()
            .filter_map(|k| {
                block
                    .cols
                    .iter()
                    .position(|c| c.kind == ColKind::Tag && &c.label == k)
                    .map(|i| (k.clone(), i))
            })
            .collect();

        for i in 0..block.num_rows() {
            let tags: Vec<(String, String)> = key_indices
                .iter()
                .map(|(label, idx)| {
                    block.data[*idx][i]
                        .as_str()
                        .map(|v| (label.clone(), v.to_string()))
                        .ok_or_else(|| Error::Type(format!("tag column {label:?} is not a string")))
                })
                .collect::<Result<_>>()?;
            let key = PartitionKey::new(block.bounds, tags);
            let row = block.row_values(i);
            self.dataset
                .cache()
                .with_builder(&key, || cols.clone(), |b| b.append_row(row))?;
        }
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
