//! Partition-keyed cache of block builders, shared by the row-preserving
//! transformations (window, merge).

use std::collections::HashMap;
use std::sync::Mutex;

use ifql_core::block::{Block, ColMeta};
use ifql_core::Result;

use crate::alloc::Allocator;
use crate::block::{BlockBuilder, PartitionKey};
use crate::dataset::DataCache;
use crate::lock;

pub struct BlockBuilderCache {
    alloc: Allocator,
    builders: Mutex<HashMap<PartitionKey, BlockBuilder>>,
}

impl BlockBuilderCache {
    pub fn new(alloc: Allocator) -> Self {
        Self {
            alloc,
            builders: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` against the partition's builder, creating it with `cols` on
    /// first touch.
    pub fn with_builder<F>(
        &self,
        key: &PartitionKey,
        cols: impl FnOnce() -> Vec<ColMeta>,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<()>,
    {
        let mut builders = lock(&self.builders);
        let builder = match builders.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(BlockBuilder::new(&self.alloc, key.bounds, cols())?)
            }
        };
        f(builder)
    }
}

impl DataCache for BlockBuilderCache {
    fn partition_keys(&self) -> Vec<PartitionKey> {
        lock(&self.builders).keys().cloned().collect()
    }

    fn build(&self, key: &PartitionKey) -> Result<Block> {
        let builders = lock(&self.builders);
        match builders.get(key) {
            Some(b) => Ok(b.build()),
            None => Ok(Block::new(key.bounds, Vec::new())),
        }
    }

    fn expire(&self, key: &PartitionKey) {
        lock(&self.builders).remove(key);
    }
}
