//! Address -> size bookkeeping for allocated blocks.

use std::collections::BTreeMap;

/// Every currently allocated block, keyed by address.
///
/// Ordered so introspection enumerates blocks by ascending address.
#[derive(Debug, Clone, Default)]
pub struct AllocationTable {
    blocks: BTreeMap<usize, usize>,
    allocated_bytes: usize,
}

impl AllocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an allocated block. Returns false if the address was already taken.
    pub fn insert(&mut self, address: usize, size: usize) -> bool {
        if self.blocks.contains_key(&address) {
            return false;
        }
        self.blocks.insert(address, size);
        self.allocated_bytes += size;
        true
    }

    /// Size recorded for `address`, if allocated.
    pub fn get(&self, address: usize) -> Option<usize> {
        self.blocks.get(&address).copied()
    }

    /// True if `address` is allocated with exactly `size`.
    pub fn matches(&self, address: usize, size: usize) -> bool {
        self.get(address) == Some(size)
    }

    /// Removes the block at `address`, returning its size.
    pub fn remove(&mut self, address: usize) -> Option<usize> {
        let size = self.blocks.remove(&address)?;
        self.allocated_bytes -= size;
        Some(size)
    }

    /// Blocks in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.blocks.iter().map(|(&addr, &size)| (addr, size))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of all allocated block sizes.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }
}
