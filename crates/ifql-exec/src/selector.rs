//! Selector transformations: one row per partition.
//!
//! Row selectors pick by a column's value (min, max); index selectors pick
//! by position (first, last). The output row's time column is the
//! partition stop by default, its start with `use_start_time`, or the
//! selected row's own time with `use_row_time`. Tag columns pass through
//! from the selected row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ifql_core::block::{Block, ColMeta};
use ifql_core::id::DatasetId;
use ifql_core::time::Time;
use ifql_core::values::Value;
use ifql_core::{Error, Result};

use crate::alloc::{AllocGuard, Allocator};
use crate::block::PartitionKey;
use crate::dataset::{DataCache, Dataset};
use crate::lock;
use crate::transformation::{ParentState, Transformation};

#[derive(Debug, Clone, Default)]
pub struct SelectorConfig {
    /// Column driving a row selector; default is the first value column.
    pub column: Option<String>,
    pub use_start_time: bool,
    pub use_row_time: bool,
}

/// Decides whether each observed value replaces the current selection.
pub trait RowSelector: Send {
    fn select(&mut self, v: f64) -> bool;
}

/// Picks a row of each incoming block by position, or none.
pub trait IndexSelector: Send {
    fn choose(&mut self, num_rows: usize) -> Option<usize>;
}

struct SelEntry {
    cols: Vec<ColMeta>,
    row: Option<Vec<Value>>,
    row_time: Time,
    row_sel: Option<Box<dyn RowSelector>>,
    index_sel: Option<Box<dyn IndexSelector>>,
    _guard: AllocGuard,
}

/// The chosen row per partition key; seals to a one-row block with the
/// configured time column.
pub struct SelectorCache {
    alloc: Allocator,
    config: SelectorConfig,
    entries: Mutex<HashMap<PartitionKey, SelEntry>>,
}

const SELECTOR_STATE_BYTES: usize = 128;

impl SelectorCache {
    pub fn new(alloc: Allocator, config: SelectorConfig) -> Self {
        Self {
            alloc,
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl DataCache for SelectorCache {
    fn partition_keys(&self) -> Vec<PartitionKey> {
        lock(&self.entries).keys().cloned().collect()
    }

    fn build(&self, key: &PartitionKey) -> Result<Block> {
        let entries = lock(&self.entries);
        let Some(entry) = entries.get(key) else {
            return Ok(Block::new(key.bounds, Vec::new()));
        };
        let mut block = Block::new(key.bounds, entry.cols.clone());
        if let Some(row) = &entry.row {
            let mut row = row.clone();
            let time = if self.config.use_row_time {
                entry.row_time
            } else if self.config.use_start_time {
                key.bounds.start
            } else {
                key.bounds.stop
            };
            if let Some(idx) = block.time_col_index() {
                row[idx] = Value::Time(time);
            }
            block.push_row(row);
        }
        Ok(block)
    }

    fn expire(&self, key: &PartitionKey) {
        lock(&self.entries).remove(key);
    }
}

enum SelectorMaker {
    Row(Box<dyn Fn() -> Box<dyn RowSelector> + Send + Sync>),
    Index(Box<dyn Fn() -> Box<dyn IndexSelector> + Send + Sync>),
}

struct SelectorTransformation {
    dataset: Arc<Dataset<SelectorCache>>,
    parents: ParentState,
    column: Option<String>,
    maker: SelectorMaker,
}

impl SelectorTransformation {
    fn observe(&self, block: &Block) -> Result<()> {
        let key = PartitionKey::from_block(block);
        let cache = self.dataset.cache();
        let mut entries = lock(&cache.entries);
        let entry = match entries.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let (row_sel, index_sel) = match &self.maker {
                    SelectorMaker::Row(make) => (Some(make()), None),
                    SelectorMaker::Index(make) => (None, Some(make())),
                };
                e.insert(SelEntry {
                    cols: block.cols.clone(),
                    row: None,
                    row_time: Time::MIN,
                    row_sel,
                    index_sel,
                    _guard: cache.alloc.account(SELECTOR_STATE_BYTES)?,
                })
            }
        };

        if let Some(sel) = entry.row_sel.as_mut() {
            let value_idx = block
                .value_col_index(self.column.as_deref())
                .ok_or_else(|| {
                    Error::Type(format!(
                        "selector column {:?} not found",
                        self.column.as_deref().unwrap_or("_value")
                    ))
                })?;
            for i in 0..block.num_rows() {
                let v = block.data[value_idx][i].as_f64().ok_or_else(|| {
                    Error::Type("non-numeric value in selector column".into())
                })?;
                if sel.select(v) {
                    entry.row = Some(block.row_values(i));
                    entry.row_time = block.row_time(i).unwrap_or(Time::MIN);
                }
            }
        } else if let Some(sel) = entry.index_sel.as_mut() {
            if let Some(i) = sel.choose(block.num_rows()) {
                entry.row = Some(block.row_values(i));
                entry.row_time = block.row_time(i).unwrap_or(Time::MIN);
            }
        }
        Ok(())
    }
}

impl Transformation for SelectorTransformation {
    fn process(&self, _parent: DatasetId, block: &Block) -> Result<()> {
        self.observe(block)?;
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

pub struct RowSelectorTransformation {
    inner: SelectorTransformation,
}

impl RowSelectorTransformation {
    pub fn new(
        dataset: Arc<Dataset<SelectorCache>>,
        parents: &[DatasetId],
        make: Box<dyn Fn() -> Box<dyn RowSelector> + Send + Sync>,
        config: &SelectorConfig,
    ) -> Self {
        Self {
            inner: SelectorTransformation {
                dataset,
                parents: ParentState::new(parents),
                column: config.column.clone(),
                maker: SelectorMaker::Row(make),
            },
        }
    }
}

pub struct IndexSelectorTransformation {
    inner: SelectorTransformation,
}

impl IndexSelectorTransformation {
    pub fn new(
        dataset: Arc<Dataset<SelectorCache>>,
        parents: &[DatasetId],
        make: Box<dyn Fn() -> Box<dyn IndexSelector> + Send + Sync>,
        config: &SelectorConfig,
    ) -> Self {
        Self {
            inner: SelectorTransformation {
                dataset,
                parents: ParentState::new(parents),
                column: config.column.clone(),
                maker: SelectorMaker::Index(make),
            },
        }
    }
}

macro_rules! delegate_transformation {
    ($outer:ty) => {
        impl Transformation for $outer {
            fn process(&self, parent: DatasetId, block: &Block) -> Result<()> {
                self.inner.process(parent, block)
            }
            fn retract_block(&self, parent: DatasetId, key: &PartitionKey) -> Result<()> {
                self.inner.retract_block(parent, key)
            }
            fn update_watermark(&self, parent: DatasetId, t: Time) -> Result<()> {
                self.inner.update_watermark(parent, t)
            }
            fn update_processing_time(&self, parent: DatasetId, t: Time) -> Result<()> {
                self.inner.update_processing_time(parent, t)
            }
            fn finish(&self, parent: DatasetId, err: Option<Error>) {
                self.inner.finish(parent, err)
            }
        }
    };
}

delegate_transformation!(RowSelectorTransformation);
delegate_transformation!(IndexSelectorTransformation);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Node;
    use crate::executor::ResultSink;
    use ifql_core::block::VALUE_COL_LABEL;
    use ifql_core::time::Bounds;
    use ifql_core::values::DataType;

    struct MinSelector {
        min: Option<f64>,
    }

    impl RowSelector for MinSelector {
        fn select(&mut self, v: f64) -> bool {
            match self.min {
                Some(cur) if v >= cur => false,
                _ => {
                    self.min = Some(v);
                    true
                }
            }
        }
    }

    struct FirstSelector {
        chosen: bool,
    }

    impl IndexSelector for FirstSelector {
        fn choose(&mut self, num_rows: usize) -> Option<usize> {
            if self.chosen || num_rows == 0 {
                return None;
            }
            self.chosen = true;
            Some(0)
        }
    }

    fn tagged_block(bounds: Bounds, tag: &str, rows: &[(i64, f64)]) -> Block {
        let mut b = Block::new(
            bounds,
            vec![
                ColMeta::time(),
                ColMeta::value(VALUE_COL_LABEL, DataType::Float),
                ColMeta::tag("t1", true),
            ],
        );
        for (t, v) in rows {
            b.push_row(vec![
                Value::Time(Time(*t)),
                Value::Float(*v),
                Value::Str(tag.into()),
            ]);
        }
        b
    }

    fn run_row_selector(config: SelectorConfig, blocks: Vec<Block>) -> Vec<Block> {
        let dataset = Dataset::new(
            DatasetId::new(1),
            Default::default(),
            SelectorCache::new(Allocator::unlimited(), config.clone()),
        );
        let t = RowSelectorTransformation::new(
            dataset.clone(),
            &[DatasetId::new(0)],
            Box::new(|| Box::new(MinSelector { min: None })),
            &config,
        );
        let sink = Arc::new(ResultSink::new());
        dataset.add_transformation(sink.clone());
        for b in &blocks {
            t.process(DatasetId::new(0), b).unwrap();
        }
        t.finish(DatasetId::new(0), None);
        let (out, err) = sink.take();
        assert!(err.is_none());
        out
    }

    #[test]
    fn min_row_at_partition_stop_by_default() {
        let bounds = Bounds::new(Time(0), Time(100));
        let out = run_row_selector(
            SelectorConfig::default(),
            vec![tagged_block(
                bounds,
                "a",
                &[(0, 4.0), (40, 1.0), (90, 7.0)],
            )],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].row_time(0), Some(Time(100)));
        assert_eq!(out[0].data[1][0], Value::Float(1.0));
        assert_eq!(out[0].data[2][0], Value::Str("a".into()));
    }

    #[test]
    fn use_row_time_keeps_selected_row_time() {
        let bounds = Bounds::new(Time(0), Time(100));
        let out = run_row_selector(
            SelectorConfig {
                use_row_time: true,
                ..Default::default()
            },
            vec![tagged_block(bounds, "a", &[(0, 4.0), (40, 1.0), (90, 7.0)])],
        );
        assert_eq!(out[0].row_time(0), Some(Time(40)));
    }

    #[test]
    fn use_start_time_uses_partition_start() {
        let bounds = Bounds::new(Time(0), Time(100));
        let out = run_row_selector(
            SelectorConfig {
                use_start_time: true,
                ..Default::default()
            },
            vec![tagged_block(bounds, "a", &[(10, 4.0)])],
        );
        assert_eq!(out[0].row_time(0), Some(Time(0)));
    }

    #[test]
    fn partitions_select_independently() {
        let bounds = Bounds::new(Time(0), Time(100));
        let mut out = run_row_selector(
            SelectorConfig::default(),
            vec![
                tagged_block(bounds, "a", &[(0, 4.0), (40, 1.0)]),
                tagged_block(bounds, "b", &[(0, 3.3), (90, 1.3)]),
            ],
        );
        out.sort_by_key(|b| b.sort_key());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].data[1][0], Value::Float(1.0));
        assert_eq!(out[1].data[1][0], Value::Float(1.3));
    }

    #[test]
    fn first_selector_keeps_first_row_per_partition() {
        let bounds0 = Bounds::new(Time(0), Time(100));
        let bounds1 = Bounds::new(Time(100), Time(200));
        let dataset = Dataset::new(
            DatasetId::new(1),
            Default::default(),
            SelectorCache::new(Allocator::unlimited(), SelectorConfig::default()),
        );
        let t = IndexSelectorTransformation::new(
            dataset.clone(),
            &[DatasetId::new(0)],
            Box::new(|| Box::new(FirstSelector { chosen: false })),
            &SelectorConfig::default(),
        );
        let sink = Arc::new(ResultSink::new());
        dataset.add_transformation(sink.clone());
        t.process(
            DatasetId::new(0),
            &tagged_block(bounds0, "a", &[(0, 0.0), (10, 1.0)]),
        )
        .unwrap();
        t.process(
            DatasetId::new(0),
            &tagged_block(bounds1, "a", &[(100, 10.0), (110, 11.0)]),
        )
        .unwrap();
        t.finish(DatasetId::new(0), None);
        let (mut out, err) = sink.take();
        assert!(err.is_none());
        out.sort_by_key(|b| b.sort_key());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].row_time(0), Some(Time(100)));
        assert_eq!(out[0].data[1][0], Value::Float(0.0));
        assert_eq!(out[1].row_time(0), Some(Time(200)));
        assert_eq!(out[1].data[1][0], Value::Float(10.0));
    }
}
