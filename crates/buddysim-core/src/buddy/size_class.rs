//! Power-of-two size classes.
//!
//! Every block in the pool has a size that is a power of two. A request is
//! rounded up to the nearest power of two, its size class. Free lists are
//! indexed by the class order (`log2(size)`), so scanning orders upward is
//! the same as scanning sizes in ascending order.

use crate::error::{BuddyError, BuddyResult};

/// Rounds `requested` up to the smallest power of two that holds it.
///
/// Fails with [`BuddyError::InvalidSize`] for zero. Pool capacity is not
/// checked here; the allocator turns away requests above the pool size before
/// classifying, so the overflow case is only reachable by direct callers.
pub fn classify(requested: usize) -> BuddyResult<usize> {
    if requested == 0 {
        return Err(BuddyError::InvalidSize { requested });
    }
    requested
        .checked_next_power_of_two()
        .ok_or(BuddyError::InvalidSize { requested })
}

/// Returns the order (`log2`) of a power-of-two class.
#[inline]
pub const fn order_of(class: usize) -> usize {
    class.trailing_zeros() as usize
}

/// Returns the class size for an order.
#[inline]
pub const fn class_of(order: usize) -> usize {
    1 << order
}

/// Returns the buddy address of the block `(address, class)`.
#[inline]
pub const fn buddy_of(address: usize, class: usize) -> usize {
    address ^ class
}

/// True if `(address, class)` is a well-formed block: power-of-two size,
/// naturally aligned.
#[inline]
pub const fn is_aligned_block(address: usize, class: usize) -> bool {
    class.is_power_of_two() && address % class == 0
}
