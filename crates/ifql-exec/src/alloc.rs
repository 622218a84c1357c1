//! Memory allocator: a shared atomic budget with RAII guards.
//!
//! Every block builder and join buffer accounts its bytes here before
//! growing. Acquisition is a compare-and-swap loop; exceeding the budget is
//! an error, never a block. Dropping a guard returns its bytes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ifql_core::{Error, Result};

#[derive(Debug)]
struct AllocInner {
    capacity: usize,
    used: AtomicUsize,
}

impl AllocInner {
    fn try_acquire(&self, bytes: usize) -> bool {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[derive(Clone)]
pub struct Allocator {
    inner: Arc<AllocInner>,
}

impl Allocator {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(AllocInner {
                capacity: capacity_bytes,
                used: AtomicUsize::new(0),
            }),
        }
    }

    /// No effective budget; used by tests.
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    pub fn capacity_bytes(&self) -> usize {
        self.inner.capacity
    }

    /// Advisory; not a correctness API.
    pub fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    /// Acquire `bytes` from the budget, or fail with resource exhaustion.
    pub fn account(&self, bytes: usize) -> Result<AllocGuard> {
        if bytes > 0 && !self.inner.try_acquire(bytes) {
            return Err(self.exhausted(bytes));
        }
        Ok(AllocGuard {
            inner: Arc::clone(&self.inner),
            bytes,
        })
    }

    pub fn exhausted(&self, requested: usize) -> Error {
        Error::ResourceExhausted {
            requested,
            capacity: self.inner.capacity,
            used: self.used_bytes(),
        }
    }
}

/// Accounts a number of bytes; dropping it returns them to the budget.
#[derive(Debug)]
pub struct AllocGuard {
    inner: Arc<AllocInner>,
    bytes: usize,
}

impl AllocGuard {
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Try to grow this guard by `additional` bytes. Returns false when
    /// the budget cannot cover it; the guard is unchanged.
    pub fn grow(&mut self, additional: usize) -> bool {
        if additional == 0 {
            return true;
        }
        if self.inner.try_acquire(additional) {
            self.bytes += additional;
            true
        } else {
            false
        }
    }
}

impl Drop for AllocGuard {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            self.bytes = 0;
        }
    }
}
