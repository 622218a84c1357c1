//! The storage reader interface and the in-memory reference reader.
//!
//! Execution addresses storage only through `StorageReader`; the reader
//! honors the pushed-down read spec: bounds clipping, per-row predicate
//! evaluation, and the row limit.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use ifql_ast::Expression;
use ifql_core::block::Block;
use ifql_core::time::Time;
use ifql_core::{Error, Result};

use crate::predicate::{eval_predicate, RowContext};

/// What a select procedure asks storage for.
#[derive(Debug, Clone, Default)]
pub struct ReadSpec {
    pub database: String,
    pub predicate: Option<Expression>,
    pub limit: Option<u64>,
    pub group_keys: Vec<String>,
    pub group_except: Vec<String>,
    pub merge_all: bool,
}

pub trait BlockIterator: Send {
    fn next_block(&mut self) -> Option<Block>;
}

impl std::fmt::Debug for dyn BlockIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn BlockIterator")
    }
}

pub trait StorageReader: Send + Sync {
    /// Blocks whose bounds lie within `[start, stop)`.
    fn read(&self, spec: &ReadSpec, start: Time, stop: Time) -> Result<Box<dyn BlockIterator>>;
}

struct VecBlockIterator {
    blocks: VecDeque<Block>,
}

impl BlockIterator for VecBlockIterator {
    fn next_block(&mut self) -> Option<Block> {
        self.blocks.pop_front()
    }
}

/// Databases of pre-built blocks, for tests and the CLI.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<HashMap<String, Vec<Block>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, database: &str, block: Block) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.entry(database.to_string()).or_default().push(block);
    }
}

impl StorageReader for MemoryStorage {
    fn read(&self, spec: &ReadSpec, start: Time, stop: Time) -> Result<Box<dyn BlockIterator>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let stored = inner
            .get(&spec.database)
            .ok_or_else(|| Error::Read(format!("unknown database {:?}", spec.database)))?;

        let window = ifql_core::time::Bounds::new(start, stop);
        let mut blocks = VecDeque::new();
        for block in stored {
            if !block.bounds.overlaps(&window) {
                continue;
            }
            let mut out = Block::new(block.bounds.intersect(&window), block.cols.clone());
            let mut taken = 0u64;
            for i in 0..block.num_rows() {
                let Some(t) = block.row_time(i) else {
                    continue;
                };
                if !window.contains(t) {
                    continue;
                }
                let row = block.row_values(i);
                if let Some(pred) = &spec.predicate {
                    let cx = RowContext {
                        cols: &block.cols,
                        row: &row,
                    };
                    if !eval_predicate(pred, &cx)? {
                        continue;
                    }
                }
                if let Some(limit) = spec.limit {
                    if taken >= limit {
                        break;
                    }
                }
                taken += 1;
                out.push_row(row);
            }
            if out.num_rows() > 0 {
                blocks.push_back(out);
            }
        }
        Ok(Box::new(VecBlockIterator { blocks }))
    }
}
