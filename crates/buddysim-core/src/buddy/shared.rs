//! Thread-safe allocator handle.
//!
//! The free lists and the allocation table form one resource: a split or a
//! merge touches several classes at once, and the partition invariant spans
//! the whole pool. The engine therefore sits behind a single
//! `parking_lot::Mutex` held for the full duration of every call.

use parking_lot::Mutex;

use super::allocator::BuddyAllocator;
use super::audit::InvariantViolation;
use super::snapshot::{BuddyStats, Snapshot};
use crate::config::BuddyConfig;
use crate::error::BuddyResult;

/// A [`BuddyAllocator`] shared between threads.
#[derive(Debug)]
pub struct SharedBuddyAllocator {
    inner: Mutex<BuddyAllocator>,
}

impl SharedBuddyAllocator {
    /// Creates a shared allocator over `[0, total_size)`.
    pub fn new(total_size: usize) -> BuddyResult<Self> {
        BuddyAllocator::new(total_size).map(Self::from_allocator)
    }

    /// Creates a shared allocator from an explicit config.
    pub fn with_config(config: BuddyConfig) -> BuddyResult<Self> {
        BuddyAllocator::with_config(config).map(Self::from_allocator)
    }

    /// Wraps an existing allocator.
    #[must_use]
    pub fn from_allocator(allocator: BuddyAllocator) -> Self {
        Self {
            inner: Mutex::new(allocator),
        }
    }

    pub fn allocate(&self, requested: usize) -> BuddyResult<usize> {
        self.inner.lock().allocate(requested)
    }

    pub fn free(&self, address: usize, requested: usize) -> BuddyResult<()> {
        self.inner.lock().free(address, requested)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    pub fn stats(&self) -> BuddyStats {
        self.inner.lock().stats()
    }

    pub fn verify_partition(&self) -> Result<(), InvariantViolation> {
        self.inner.lock().verify_partition()
    }

    /// Runs `f` with exclusive access, for multi-step sequences that must be atomic.
    pub fn with_locked<R>(&self, f: impl FnOnce(&mut BuddyAllocator) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Unwraps the inner allocator.
    #[must_use]
    pub fn into_inner(self) -> BuddyAllocator {
        self.inner.into_inner()
    }
}
