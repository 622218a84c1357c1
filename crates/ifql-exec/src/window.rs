//! Window transformation: re-bucket rows into fixed or overlapping time
//! windows.
//!
//! A row at time `t` lands in every window `[s, s + period)` with
//! `s <= t < s + period` and `s` on the `every` grid. With
//! `period == every` the windows tile; with `period > every` they overlap
//! and rows duplicate into each covering window.

use std::sync::Arc;

use ifql_core::block::Block;
use ifql_core::id::DatasetId;
use ifql_core::time::{Bounds, Duration, Time};
use ifql_core::{Error, Result};

use crate::block::PartitionKey;
use crate::cache::BlockBuilderCache;
use crate::dataset::Dataset;
use crate::transformation::{ParentState, Transformation};

pub struct WindowTransformation {
    dataset: Arc<Dataset<BlockBuilderCache>>,
    parents: ParentState,
    every: Duration,
    period: Duration,
    /// Grid offset: window starts are `start + k * every`.
    start: Time,
}

impl WindowTransformation {
    pub fn new(
        dataset: Arc<Dataset<BlockBuilderCache>>,
        parents: &[DatasetId],
        every: Duration,
        period: Duration,
        start: Time,
    ) -> Self {
        Self {
            dataset,
            parents: ParentState::new(parents),
            every,
            period,
            start,
        }
    }

    /// All windows containing `t`, latest first.
    fn windows(&self, t: Time) -> Vec<Bounds> {
        let e = self.every.0;
        let p = self.period.0;
        let rel = t.0 - self.start.0;
        let mut s = self.start.0 + rel.div_euclid(e) * e;
        let mut out = Vec::new();
        while t.0 < s + p {
            out.push(Bounds::new(Time(s), Time(s + p)));
            s -= e;
        }
        out
    }
}

impl Transformation for WindowTransformation {
    fn process(&self, _parent: DatasetId, block: &Block) -> Result<()> {
        let tags = block.common_tags();
        for i in 0..block.num_rows() {
            let t = block
                .row_time(i)
                .ok_or_else(|| Error::Type("window input row has no time".into()))?;
            let row = block.row_values(i);
            for bounds in self.windows(t) {
                let key = PartitionKey::new(bounds, tags.clone());
                self.dataset
                    .cache()
                    .with_builder(&key, || block.cols.clone(), |b| b.append_row(row.clone()))?;
            }
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
