//! The transformation capability set and shared multi-parent bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use ifql_core::block::Block;
use ifql_core::id::DatasetId;
use ifql_core::time::Time;
use ifql_core::{Error, Result};

use crate::block::PartitionKey;
use crate::lock;

/// A consumer of blocks from one or more parent datasets.
///
/// Within a single parent, calls arrive strictly ordered. A transformation
/// with several parents is called concurrently from their source threads
/// and must serialize its own mutation; the per-dataset cache lock is
/// sufficient.
pub trait Transformation: Send + Sync {
    /// Consume one block.
    fn process(&self, parent: DatasetId, block: &Block) -> Result<()>;

    /// Retract a previously delivered partition (streaming correction).
    fn retract_block(&self, parent: DatasetId, key: &PartitionKey) -> Result<()>;

    /// No row with time earlier than `t` will arrive from this parent.
    fn update_watermark(&self, parent: DatasetId, t: Time) -> Result<()>;

    /// Advance the real-time clock as observed by this parent.
    fn update_processing_time(&self, parent: DatasetId, t: Time) -> Result<()>;

    /// The named parent will never call again. An error, if present,
    /// propagates to this transformation's own dataset.
    fn finish(&self, parent: DatasetId, err: Option<Error>);
}

/// Tracks the watermark and finish state of a transformation's parents.
/// The watermark forwarded downstream is the minimum across parents, which
/// stays at `Time::MIN` until every parent has reported.
pub struct ParentState {
    inner: Mutex<ParentInner>,
}

struct ParentInner {
    watermarks: HashMap<DatasetId, Time>,
    processing_time: Time,
    finished: HashSet<DatasetId>,
    expected: usize,
    err: Option<Error>,
    done: bool,
}

impl ParentState {
    pub fn new(parents: &[DatasetId]) -> Self {
        Self {
            inner: Mutex::new(ParentInner {
                watermarks: parents.iter().map(|id| (*id, Time::MIN)).collect(),
                processing_time: Time::MIN,
                finished: HashSet::new(),
                expected: parents.len(),
                err: None,
                done: false,
            }),
        }
    }

    /// Record a parent's watermark; returns the minimum across parents.
    /// Per-parent watermarks never move backwards.
    pub fn update_watermark(&self, parent: DatasetId, t: Time) -> Time {
        let mut inner = lock(&self.inner);
        let entry = inner.watermarks.entry(parent).or_insert(Time::MIN);
        if t > *entry {
            *entry = t;
        }
        inner
            .watermarks
            .values()
            .min()
            .copied()
            .unwrap_or(Time::MIN)
    }

    pub fn update_processing_time(&self, t: Time) -> Time {
        let mut inner = lock(&self.inner);
        if t > inner.processing_time {
            inner.processing_time = t;
        }
        inner.processing_time
    }

    /// Record a parent finish. Returns `Some(first error)` exactly once,
    /// when the last parent finishes.
    pub fn finish(&self, parent: DatasetId, err: Option<Error>) -> Option<Option<Error>> {
        let mut inner = lock(&self.inner);
        if inner.err.is_none() {
            inner.err = err;
        }
        inner.finished.insert(parent);
        if !inner.done && inner.finished.len() >= inner.expected {
            inner.done = true;
            return Some(inner.err.clone());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_watermark_waits_for_all_parents() {
        let a = DatasetId::new(1);
        let b = DatasetId::new(2);
        let ps = ParentState::new(&[a, b]);
        assert_eq!(ps.update_watermark(a, Time(100)), Time::MIN);
        assert_eq!(ps.update_watermark(b, Time(50)), Time(50));
        assert_eq!(ps.update_watermark(a, Time(200)), Time(50));
        assert_eq!(ps.update_watermark(b, Time(150)), Time(150));
    }

    #[test]
    fn watermark_never_regresses() {
        let a = DatasetId::new(1);
        let ps = ParentState::new(&[a]);
        assert_eq!(ps.update_watermark(a, Time(100)), Time(100));
        assert_eq!(ps.update_watermark(a, Time(40)), Time(100));
    }

    #[test]
    fn finish_fires_once_after_all_parents() {
        let a = DatasetId::new(1);
        let b = DatasetId::new(2);
        let ps = ParentState::new(&[a, b]);
        assert!(ps.finish(a, None).is_none());
        let done = ps.finish(b, Some(Error::Cancelled));
        assert!(matches!(done, Some(Some(Error::Cancelled))));
        assert!(ps.finish(b, None).is_none());
    }
}
