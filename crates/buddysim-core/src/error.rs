//! Error taxonomy for the buddy engine.
//!
//! Caller-facing failures (`InvalidSize`, `InvalidPoolSize`, `AllocationFailed`,
//! `MismatchedBlock`) are rejected before any state change. The internal
//! variants indicate an engine defect and are never expected in correct use.

use thiserror::Error;

use crate::buddy::audit::InvariantViolation;

/// Result alias used throughout the engine.
pub type BuddyResult<T> = Result<T, BuddyError>;

/// Errors returned by [`BuddyAllocator`](crate::BuddyAllocator) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuddyError {
    /// Request of zero bytes.
    #[error("invalid request size {requested}")]
    InvalidSize { requested: usize },
    /// Pool size that is zero or not a power of two.
    #[error("pool size {total} is not a positive power of two")]
    InvalidPoolSize { total: usize },
    /// No free block of at least `class` bytes exists. `class` is 0 when the
    /// request's class does not fit a `usize`.
    #[error("allocation failed: no free block for {requested} bytes (class {class})")]
    AllocationFailed { requested: usize, class: usize },
    /// `free` targeted an address that is not allocated with this size class.
    #[error("no allocated block of {size} bytes at address {address}")]
    MismatchedBlock { address: usize, size: usize },
    /// A free-list removal found no entry for an address the engine expected.
    #[error("internal invariant violation: address {address} missing from free class {class}")]
    InternalInvariantViolation { class: usize, address: usize },
    /// The post-mutation partition audit failed.
    #[error("internal invariant violation: {0}")]
    PartitionBroken(#[from] InvariantViolation),
}

impl BuddyError {
    /// Returns true for failures caused by an engine defect rather than the caller.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InternalInvariantViolation { .. } | Self::PartitionBroken(_)
        )
    }

    /// Returns true for the expected out-of-memory outcome.
    #[must_use]
    pub const fn is_exhaustion(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }
}

/// Errors reported by the free-list manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FreeListError {
    #[error("address {address} not present in free class {class}")]
    NotFound { class: usize, address: usize },
}

impl From<FreeListError> for BuddyError {
    fn from(err: FreeListError) -> Self {
        match err {
            FreeListError::NotFound { class, address } => {
                Self::InternalInvariantViolation { class, address }
            }
        }
    }
}
