//! Read-only views of allocator state.

use serde::{Deserialize, Serialize};

/// An `(address, size)` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockInfo {
    pub address: usize,
    pub size: usize,
}

/// Free blocks of one size class, addresses ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeClassInfo {
    pub size: usize,
    pub addresses: Vec<usize>,
}

/// Point-in-time copy of the allocation table and free lists.
///
/// `allocated` is ordered by address and `free_classes` by ascending size,
/// so two snapshots of the same state compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub total_size: usize,
    pub allocated: Vec<BlockInfo>,
    pub free_classes: Vec<FreeClassInfo>,
}

impl Snapshot {
    /// Sizes of the non-empty free classes, ascending.
    #[must_use]
    pub fn free_class_sizes(&self) -> Vec<usize> {
        self.free_classes.iter().map(|c| c.size).collect()
    }

    /// Every free block, class by class.
    pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.free_classes.iter().flat_map(|c| {
            c.addresses.iter().map(|&address| BlockInfo {
                address,
                size: c.size,
            })
        })
    }

    /// Addresses free at `size`, or an empty slice.
    #[must_use]
    pub fn free_at(&self, size: usize) -> &[usize] {
        self.free_classes
            .iter()
            .find(|c| c.size == size)
            .map(|c| c.addresses.as_slice())
            .unwrap_or(&[])
    }

    /// True if the pool is back to its initial single free block.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.allocated.is_empty()
            && self.free_classes.len() == 1
            && self.free_classes[0].size == self.total_size
            && self.free_classes[0].addresses == [0]
    }
}

/// Aggregate occupancy figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuddyStats {
    pub total_size: usize,
    pub allocated_bytes: usize,
    pub free_bytes: usize,
    pub allocated_blocks: usize,
    pub free_blocks: usize,
    /// Largest free block, 0 when the pool is fully allocated.
    pub largest_free_block: usize,
    /// Share of free memory not in the largest free block, in permille.
    pub fragmentation_permille: u16,
}

impl BuddyStats {
    pub(crate) fn compute(
        total_size: usize,
        allocated_bytes: usize,
        allocated_blocks: usize,
        free_bytes: usize,
        free_blocks: usize,
        largest_free_block: usize,
    ) -> Self {
        let fragmentation_permille = if free_bytes == 0 {
            0
        } else {
            let contiguous = (largest_free_block as u128 * 1000) / free_bytes as u128;
            (1000 - contiguous.min(1000)) as u16
        };
        Self {
            total_size,
            allocated_bytes,
            free_bytes,
            allocated_blocks,
            free_blocks,
            largest_free_block,
            fragmentation_permille,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            total_size: 1024,
            allocated: vec![BlockInfo {
                address: 256,
                size: 256,
            }],
            free_classes: vec![
                FreeClassInfo {
                    size: 256,
                    addresses: vec![0],
                },
                FreeClassInfo {
                    size: 512,
                    addresses: vec![512],
                },
            ],
        }
    }

    #[test]
    fn free_class_helpers() {
        let snap = sample();
        assert_eq!(snap.free_class_sizes(), vec![256, 512]);
        assert_eq!(snap.free_at(512), &[512]);
        assert!(snap.free_at(128).is_empty());
        let blocks: Vec<BlockInfo> = snap.free_blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert!(!snap.is_pristine());
    }

    #[test]
    fn pristine_detection() {
        let snap = Snapshot {
            total_size: 64,
            allocated: Vec::new(),
            free_classes: vec![FreeClassInfo {
                size: 64,
                addresses: vec![0],
            }],
        };
        assert!(snap.is_pristine());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["total_size"], 1024);
        assert_eq!(json["allocated"][0]["address"], 256);
        assert_eq!(json["free_classes"][1]["size"], 512);
        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn fragmentation_ratio() {
        let stats = BuddyStats::compute(1024, 256, 1, 768, 2, 512);
        assert_eq!(stats.fragmentation_permille, 334);
        let stats = BuddyStats::compute(1024, 0, 0, 1024, 1, 1024);
        assert_eq!(stats.fragmentation_permille, 0);
        let stats = BuddyStats::compute(1024, 1024, 1, 0, 0, 0);
        assert_eq!(stats.fragmentation_permille, 0);
    }
}
