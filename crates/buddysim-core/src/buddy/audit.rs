//! Partition audit.
//!
//! Checks that the free and allocated blocks together tile `[0, T)` exactly:
//! every block is a naturally aligned power of two, sorted blocks are
//! contiguous with no overlap or gap, no address is listed twice, and the
//! byte totals add up to `T`.

use thiserror::Error;

use super::size_class::is_aligned_block;

/// A detected breach of the partition invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("block ({address}, {size}) is not a naturally aligned power of two")]
    Misaligned { address: usize, size: usize },
    #[error("block at {address} overlaps the block ending at {previous_end}")]
    Overlap { address: usize, previous_end: usize },
    #[error("gap between {from} and {to}")]
    Gap { from: usize, to: usize },
    #[error("address {address} is recorded more than once")]
    DuplicateAddress { address: usize },
    #[error("allocated {allocated} + free {free} != pool size {total}")]
    Conservation {
        allocated: usize,
        free: usize,
        total: usize,
    },
}

/// State of a block under audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Allocated,
}

/// Verifies that `blocks` partition `[0, total)`.
pub fn check_partition(
    total: usize,
    blocks: &mut [(usize, usize, BlockState)],
) -> Result<(), InvariantViolation> {
    let mut allocated = 0_usize;
    let mut free = 0_usize;
    for &(address, size, state) in blocks.iter() {
        if !is_aligned_block(address, size) {
            return Err(InvariantViolation::Misaligned { address, size });
        }
        match state {
            BlockState::Free => free = free.saturating_add(size),
            BlockState::Allocated => allocated = allocated.saturating_add(size),
        }
    }

    blocks.sort_unstable_by_key(|&(address, size, _)| (address, size));
    let mut cursor = 0_usize;
    let mut previous: Option<usize> = None;
    for &(address, size, _) in blocks.iter() {
        if previous == Some(address) {
            return Err(InvariantViolation::DuplicateAddress { address });
        }
        previous = Some(address);
        if address < cursor {
            return Err(InvariantViolation::Overlap {
                address,
                previous_end: cursor,
            });
        }
        if address > cursor {
            return Err(InvariantViolation::Gap {
                from: cursor,
                to: address,
            });
        }
        cursor = address.saturating_add(size);
    }
    if cursor < total {
        return Err(InvariantViolation::Gap {
            from: cursor,
            to: total,
        });
    }

    if allocated.saturating_add(free) != total {
        return Err(InvariantViolation::Conservation {
            allocated,
            free,
            total,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use BlockState::{Allocated, Free};

    #[test]
    fn single_free_block_is_valid() {
        let mut blocks = [(0, 1024, Free)];
        assert_eq!(check_partition(1024, &mut blocks), Ok(()));
    }

    #[test]
    fn split_pool_is_valid_in_any_order() {
        let mut blocks = [
            (512, 512, Free),
            (0, 128, Allocated),
            (256, 256, Allocated),
            (128, 128, Free),
        ];
        assert_eq!(check_partition(1024, &mut blocks), Ok(()));
    }

    #[test]
    fn detects_gap() {
        let mut blocks = [(0, 256, Free), (512, 512, Free)];
        assert_eq!(
            check_partition(1024, &mut blocks),
            Err(InvariantViolation::Gap { from: 256, to: 512 })
        );
        let mut blocks = [(0, 512, Free)];
        assert_eq!(
            check_partition(1024, &mut blocks),
            Err(InvariantViolation::Gap {
                from: 512,
                to: 1024
            })
        );
    }

    #[test]
    fn detects_overlap() {
        let mut blocks = [(0, 512, Free), (256, 256, Allocated), (512, 512, Free)];
        assert_eq!(
            check_partition(1024, &mut blocks),
            Err(InvariantViolation::Overlap {
                address: 256,
                previous_end: 512
            })
        );
    }

    #[test]
    fn detects_duplicate() {
        let mut blocks = [(0, 512, Free), (0, 512, Allocated), (512, 512, Free)];
        assert_eq!(
            check_partition(1024, &mut blocks),
            Err(InvariantViolation::DuplicateAddress { address: 0 })
        );
    }

    #[test]
    fn detects_misalignment() {
        let mut blocks = [(64, 128, Free)];
        assert_eq!(
            check_partition(1024, &mut blocks),
            Err(InvariantViolation::Misaligned {
                address: 64,
                size: 128
            })
        );
    }

    #[test]
    fn detects_overrun_as_conservation() {
        let mut blocks = [(0, 1024, Free), (1024, 1024, Free)];
        assert_eq!(
            check_partition(1024, &mut blocks),
            Err(InvariantViolation::Conservation {
                allocated: 0,
                free: 2048,
                total: 1024
            })
        );
    }
}
