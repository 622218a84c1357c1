//! Partition keys and the allocator-accounted block builder.

use ifql_core::block::{Block, ColKind, ColMeta};
use ifql_core::time::{Bounds, Time};
use ifql_core::values::Value;
use ifql_core::Result;

use crate::alloc::{AllocGuard, Allocator};

/// Identifies a group within a dataset: the block bounds together with the
/// values of the grouping tag columns, sorted by label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub bounds: Bounds,
    pub tags: Vec<(String, String)>,
}

impl PartitionKey {
    pub fn new(bounds: Bounds, mut tags: Vec<(String, String)>) -> Self {
        tags.sort();
        Self { bounds, tags }
    }

    /// Key of a block: its bounds plus its common tag values.
    pub fn from_block(block: &Block) -> Self {
        Self::new(block.bounds, block.common_tags())
    }

    pub fn tag(&self, label: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }
}

/// Fixed overhead accounted per builder, before any rows.
const BUILDER_OVERHEAD: usize = 64;

/// Accumulates rows for one partition, charging the allocator as it grows.
/// Sealing with `build` leaves the builder intact; the owning cache expires
/// it when its trigger clears.
pub struct BlockBuilder {
    alloc: Allocator,
    guard: AllocGuard,
    block: Block,
}

impl BlockBuilder {
    pub fn new(alloc: &Allocator, bounds: Bounds, cols: Vec<ColMeta>) -> Result<Self> {
        let guard = alloc.account(BUILDER_OVERHEAD)?;
        Ok(Self {
            alloc: alloc.clone(),
            guard,
            block: Block::new(bounds, cols),
        })
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.block.cols
    }

    pub fn bounds(&self) -> Bounds {
        self.block.bounds
    }

    pub fn num_rows(&self) -> usize {
        self.block.num_rows()
    }

    pub fn append_row(&mut self, row: Vec<Value>) -> Result<()> {
        let bytes: usize = row.iter().map(Value::size_bytes).sum();
        if !self.guard.grow(bytes) {
            return Err(self.alloc.exhausted(bytes));
        }
        self.block.push_row(row);
        Ok(())
    }

    /// Seal the current contents into a block. Rows are ordered by time;
    /// out-of-order appends (merged groups) are sorted stably here.
    pub fn build(&self) -> Block {
        let mut block = self.block.clone();
        if let Some(idx) = block.time_col_index() {
            let times: Vec<Time> = block.data[idx]
                .iter()
                .map(|v| v.as_time().unwrap_or(Time::MIN))
                .collect();
            if times.windows(2).any(|w| w[0] > w[1]) {
                let mut order: Vec<usize> = (0..block.num_rows()).collect();
                order.sort_by_key(|&i| times[i]);
                for col in block.data.iter_mut() {
                    let reordered: Vec<Value> = order.iter().map(|&i| col[i].clone()).collect();
                    *col = reordered;
                }
            }
        }
        block
    }
}

/// Column metadata shared by row-preserving transformations: the input
/// schema with adjusted common flags.
pub fn cols_with_common(cols: &[ColMeta], common_labels: &[String]) -> Vec<ColMeta> {
    cols.iter()
        .map(|c| {
            if c.kind == ColKind::Tag {
                let mut c = c.clone();
                c.common = common_labels.contains(&c.label);
                c
            } else {
                c.clone()
            }
        })
        .collect()
}
