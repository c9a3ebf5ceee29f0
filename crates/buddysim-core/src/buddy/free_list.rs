//! Per-class free lists.
//!
//! One list per order, from 1 byte up to the pool size. Each list is a dense
//! stack of addresses plus an address->slot index, so insert, targeted
//! removal, membership and "take any" are all O(1). Removal swaps the last
//! entry into the vacated slot.

use std::collections::HashMap;

use super::size_class::{class_of, order_of};
use crate::error::FreeListError;

/// Free addresses of a single size class.
#[derive(Debug, Clone, Default)]
struct FreeClass {
    /// Stack of free block addresses.
    addrs: Vec<usize>,
    /// Map from address to its index in `addrs`.
    slots: HashMap<usize, usize>,
}

impl FreeClass {
    fn insert(&mut self, address: usize) -> bool {
        if self.slots.contains_key(&address) {
            return false;
        }
        self.slots.insert(address, self.addrs.len());
        self.addrs.push(address);
        true
    }

    fn remove(&mut self, address: usize) -> bool {
        let Some(idx) = self.slots.remove(&address) else {
            return false;
        };
        self.addrs.swap_remove(idx);
        if let Some(&moved) = self.addrs.get(idx) {
            self.slots.insert(moved, idx);
        }
        true
    }

    fn pop(&mut self) -> Option<usize> {
        let address = self.addrs.pop()?;
        self.slots.remove(&address);
        Some(address)
    }
}

/// Free lists for every class of a pool, indexed by order.
#[derive(Debug, Clone)]
pub struct FreeLists {
    classes: Vec<FreeClass>,
}

impl FreeLists {
    /// Creates empty lists for classes `1 ..= 2^max_order`.
    pub fn new(max_order: usize) -> Self {
        Self {
            classes: (0..=max_order).map(|_| FreeClass::default()).collect(),
        }
    }

    fn class(&self, class: usize) -> Option<&FreeClass> {
        if !class.is_power_of_two() {
            return None;
        }
        self.classes.get(order_of(class))
    }

    fn class_mut(&mut self, class: usize) -> Option<&mut FreeClass> {
        if !class.is_power_of_two() {
            return None;
        }
        self.classes.get_mut(order_of(class))
    }

    /// Records `address` as a free block of size `class`.
    ///
    /// Returns false if the class is out of range or the address is already
    /// listed; the engine never does either.
    pub fn insert(&mut self, class: usize, address: usize) -> bool {
        self.class_mut(class).is_some_and(|list| list.insert(address))
    }

    /// Removes a specific address from class `class`.
    pub fn remove(&mut self, class: usize, address: usize) -> Result<(), FreeListError> {
        if self.class_mut(class).is_some_and(|list| list.remove(address)) {
            Ok(())
        } else {
            Err(FreeListError::NotFound { class, address })
        }
    }

    /// Takes an arbitrary free block of size `class` (the most recently inserted).
    pub fn take_any(&mut self, class: usize) -> Option<usize> {
        self.class_mut(class)?.pop()
    }

    /// True if `address` is free at size `class`.
    pub fn contains(&self, class: usize, address: usize) -> bool {
        self.class(class)
            .is_some_and(|list| list.slots.contains_key(&address))
    }

    /// Number of free blocks of size `class`.
    pub fn len(&self, class: usize) -> usize {
        self.class(class).map_or(0, |list| list.addrs.len())
    }

    /// True if no block of size `class` is free.
    pub fn is_empty(&self, class: usize) -> bool {
        self.len(class) == 0
    }

    /// Smallest class `>= min_class` with at least one free block.
    ///
    /// Scans orders in ascending order; this is what makes allocation best-fit.
    pub fn smallest_available(&self, min_class: usize) -> Option<usize> {
        if !min_class.is_power_of_two() {
            return None;
        }
        self.classes
            .iter()
            .enumerate()
            .skip(order_of(min_class))
            .find(|(_, list)| !list.addrs.is_empty())
            .map(|(order, _)| class_of(order))
    }

    /// Takes one block from the smallest non-empty class `>= min_class`.
    ///
    /// Returns `(class, address)`.
    pub fn take_best_fit(&mut self, min_class: usize) -> Option<(usize, usize)> {
        let class = self.smallest_available(min_class)?;
        let address = self.take_any(class)?;
        Some((class, address))
    }

    /// Iterates non-empty classes in ascending size order.
    pub fn iter_nonempty(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.classes
            .iter()
            .enumerate()
            .filter(|(_, list)| !list.addrs.is_empty())
            .map(|(order, list)| (class_of(order), list.addrs.as_slice()))
    }

    /// Total number of free blocks across all classes.
    pub fn total_blocks(&self) -> usize {
        self.classes.iter().map(|list| list.addrs.len()).sum()
    }

    /// Total free bytes across all classes.
    pub fn total_bytes(&self) -> usize {
        self.iter_nonempty().map(|(class, addrs)| class * addrs.len()).sum()
    }

    /// Largest class with a free block, if any.
    pub fn largest_available(&self) -> Option<usize> {
        self.iter_nonempty().map(|(class, _)| class).last()
    }
}
