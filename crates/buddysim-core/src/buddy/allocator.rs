//! Buddy allocator engine.
//!
//! Owns the free lists and the allocation table for one pool `[0, T)`.
//! `allocate` takes the smallest sufficient free block and halves it down to
//! the requested class, shedding the upper halves as free buddies. `free`
//! returns a block and merges it with its buddy for as long as the buddy is
//! free at the same size.
//!
//! Every decision is recorded as a structured [`BuddyLogRecord`] in a bounded
//! buffer, retrievable with [`BuddyAllocator::lifecycle_logs`].

use std::collections::VecDeque;

use super::allocation_table::AllocationTable;
use super::audit::{self, BlockState, InvariantViolation};
use super::free_list::FreeLists;
use super::size_class::{self, buddy_of, order_of};
use super::snapshot::{BlockInfo, BuddyStats, FreeClassInfo, Snapshot};
use crate::config::{AuditLevel, BuddyConfig};
use crate::error::{BuddyError, BuddyResult};

/// Allocator lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuddyLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl BuddyLogLevel {
    /// Lowercase label used by JSONL sinks.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Structured allocator lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this lifecycle record.
    pub trace_id: String,
    /// Severity level.
    pub level: BuddyLogLevel,
    /// API symbol (`allocate`, `free`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `split`, `free`, `merge`, ...).
    pub event: &'static str,
    /// Block address involved in the event.
    pub address: Option<usize>,
    /// Size (requested or class) involved in the event.
    pub size: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Snapshot: allocated block count.
    pub allocated_blocks: usize,
    /// Snapshot: allocated bytes.
    pub allocated_bytes: usize,
    /// Snapshot: free block count.
    pub free_blocks: usize,
    /// Snapshot: free bytes.
    pub free_bytes: usize,
}

/// Buddy allocator over a simulated pool of `total_size` bytes.
#[derive(Debug, Clone)]
pub struct BuddyAllocator {
    /// Pool size `T` (a power of two).
    total_size: usize,
    /// Free blocks, one list per order `0 ..= log2(T)`.
    free_lists: FreeLists,
    /// Allocated blocks (address -> size).
    table: AllocationTable,
    /// Post-mutation audit level.
    audit: AuditLevel,
    /// Maximum retained lifecycle records.
    log_capacity: usize,
    /// Monotonic lifecycle decision id.
    next_decision_id: u64,
    /// Structured allocator lifecycle records, oldest first.
    lifecycle_logs: VecDeque<BuddyLogRecord>,
}

impl BuddyAllocator {
    /// Creates an allocator over `[0, total_size)` using the process-wide config.
    pub fn new(total_size: usize) -> BuddyResult<Self> {
        Self::with_config(BuddyConfig::new(total_size))
    }

    /// Creates an allocator from an explicit config.
    ///
    /// Fails with [`BuddyError::InvalidPoolSize`] unless the pool size is a
    /// positive power of two.
    pub fn with_config(config: BuddyConfig) -> BuddyResult<Self> {
        let total_size = config.total_size;
        if !total_size.is_power_of_two() {
            return Err(BuddyError::InvalidPoolSize { total: total_size });
        }
        let mut free_lists = FreeLists::new(order_of(total_size));
        free_lists.insert(total_size, 0);
        let mut state = Self {
            total_size,
            free_lists,
            table: AllocationTable::new(),
            audit: config.audit,
            log_capacity: config.log_capacity,
            next_decision_id: 1,
            lifecycle_logs: VecDeque::new(),
        };
        state.record_lifecycle(
            BuddyLogLevel::Debug,
            "new",
            "pool_init",
            Some(0),
            Some(total_size),
            "success",
            format!("max_order={}", order_of(total_size)),
        );
        Ok(state)
    }

    fn next_log_decision_id(&mut self) -> u64 {
        let id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn record_lifecycle(
        &mut self,
        level: BuddyLogLevel,
        symbol: &'static str,
        event: &'static str,
        address: Option<usize>,
        size: Option<usize>,
        outcome: &'static str,
        details: impl Into<String>,
    ) {
        if self.log_capacity == 0 {
            return;
        }
        let decision_id = self.next_log_decision_id();
        let trace_id = format!("core::buddy::{}::{:016x}", symbol, decision_id);
        if self.lifecycle_logs.len() >= self.log_capacity {
            self.lifecycle_logs.pop_front();
        }
        self.lifecycle_logs.push_back(BuddyLogRecord {
            decision_id,
            trace_id,
            level,
            symbol,
            event,
            address,
            size,
            outcome,
            details: details.into(),
            allocated_blocks: self.table.len(),
            allocated_bytes: self.table.allocated_bytes(),
            free_blocks: self.free_lists.total_blocks(),
            free_bytes: self.free_lists.total_bytes(),
        });
    }

    fn classify_for(&mut self, symbol: &'static str, requested: usize) -> BuddyResult<usize> {
        size_class::classify(requested).inspect_err(|_| {
            self.record_lifecycle(
                BuddyLogLevel::Warn,
                symbol,
                "invalid_size",
                None,
                Some(requested),
                "denied",
                "requested size has no power-of-two class",
            );
        })
    }

    /// Allocates a block able to hold `requested` bytes.
    ///
    /// Returns the block address. On failure the state is unchanged.
    pub fn allocate(&mut self, requested: usize) -> BuddyResult<usize> {
        if requested > self.total_size {
            // Classes above T are never free; the class may not fit a word.
            let class = requested.checked_next_power_of_two().unwrap_or(0);
            self.record_lifecycle(
                BuddyLogLevel::Info,
                "allocate",
                "alloc_failed",
                None,
                Some(requested),
                "oom",
                format!("request exceeds pool size {}", self.total_size),
            );
            return Err(BuddyError::AllocationFailed { requested, class });
        }
        let target = self.classify_for("allocate", requested)?;

        let Some((found, address)) = self.free_lists.take_best_fit(target) else {
            self.record_lifecycle(
                BuddyLogLevel::Info,
                "allocate",
                "alloc_failed",
                None,
                Some(target),
                "oom",
                "no free block of sufficient class",
            );
            return Err(BuddyError::AllocationFailed {
                requested,
                class: target,
            });
        };

        // Keep the lower half, shed the upper half, until the class fits.
        let mut class = found;
        while class > target {
            let half = class / 2;
            self.free_lists.insert(half, address + half);
            self.record_lifecycle(
                BuddyLogLevel::Trace,
                "allocate",
                "split",
                Some(address + half),
                Some(half),
                "shed",
                format!("parent={} parent_size={}", address, class),
            );
            class = half;
        }

        self.table.insert(address, target);
        self.record_lifecycle(
            BuddyLogLevel::Trace,
            "allocate",
            "alloc",
            Some(address),
            Some(target),
            "success",
            format!(
                "requested={} source_class={} path={}",
                requested,
                found,
                if found == target { "exact" } else { "split" }
            ),
        );
        self.audit_after("allocate")?;
        Ok(address)
    }

    fn remove_free(
        &mut self,
        symbol: &'static str,
        class: usize,
        address: usize,
    ) -> BuddyResult<()> {
        self.free_lists.remove(class, address).map_err(|err| {
            self.record_lifecycle(
                BuddyLogLevel::Error,
                symbol,
                "invariant_free_list_miss",
                Some(address),
                Some(class),
                "corrupted",
                err.to_string(),
            );
            BuddyError::from(err)
        })
    }

    /// Frees the block at `address` that was allocated for `requested` bytes.
    ///
    /// `requested` is classified again; the class must match the recorded
    /// block size. The freed block is merged with its buddy repeatedly until
    /// the buddy is not free or the whole pool is reassembled.
    pub fn free(&mut self, address: usize, requested: usize) -> BuddyResult<()> {
        let size = if requested > self.total_size {
            // No block larger than T is ever recorded.
            requested.checked_next_power_of_two().unwrap_or(0)
        } else {
            self.classify_for("free", requested)?
        };
        if size == 0 || !self.table.matches(address, size) {
            self.record_lifecycle(
                BuddyLogLevel::Warn,
                "free",
                "free_mismatch",
                Some(address),
                Some(size),
                "denied",
                match self.table.get(address) {
                    Some(recorded) => format!("recorded_size={}", recorded),
                    None => String::from("address_not_allocated"),
                },
            );
            return Err(BuddyError::MismatchedBlock { address, size });
        }

        self.table.remove(address);
        self.free_lists.insert(size, address);
        self.record_lifecycle(
            BuddyLogLevel::Trace,
            "free",
            "free",
            Some(address),
            Some(size),
            "success",
            format!("requested={}", requested),
        );

        let mut address = address;
        let mut size = size;
        while size < self.total_size {
            let buddy = buddy_of(address, size);
            if !self.free_lists.contains(size, buddy) {
                break;
            }
            // Both pre-merge entries leave the list before the merged block is placed.
            self.remove_free("free", size, address)?;
            self.remove_free("free", size, buddy)?;
            let merged = address.min(buddy);
            let merged_size = size * 2;
            self.free_lists.insert(merged_size, merged);
            self.record_lifecycle(
                BuddyLogLevel::Trace,
                "free",
                "merge",
                Some(merged),
                Some(merged_size),
                "coalesced",
                format!("left={} right={}", merged, merged + size),
            );
            address = merged;
            size = merged_size;
        }

        self.audit_after("free")?;
        Ok(())
    }

    fn audit_after(&mut self, symbol: &'static str) -> BuddyResult<()> {
        if !self.audit.enabled() {
            return Ok(());
        }
        self.verify_partition().map_err(|violation| {
            self.record_lifecycle(
                BuddyLogLevel::Error,
                symbol,
                "invariant_partition_broken",
                None,
                None,
                "corrupted",
                violation.to_string(),
            );
            BuddyError::from(violation)
        })
    }

    /// Checks that free and allocated blocks tile `[0, T)` exactly.
    pub fn verify_partition(&self) -> Result<(), InvariantViolation> {
        let mut blocks: Vec<(usize, usize, BlockState)> = self
            .table
            .iter()
            .map(|(addr, size)| (addr, size, BlockState::Allocated))
            .collect();
        for (class, addrs) in self.free_lists.iter_nonempty() {
            blocks.extend(addrs.iter().map(|&addr| (addr, class, BlockState::Free)));
        }
        audit::check_partition(self.total_size, &mut blocks)
    }

    /// Pool size `T`.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Size recorded for an allocated address.
    pub fn lookup(&self, address: usize) -> Option<usize> {
        self.table.get(address)
    }

    /// True if `address` is free at exactly `class`.
    pub fn is_free(&self, class: usize, address: usize) -> bool {
        self.free_lists.contains(class, address)
    }

    /// Allocated blocks in address order.
    pub fn allocated_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.table
            .iter()
            .map(|(address, size)| BlockInfo { address, size })
    }

    /// Sizes of the non-empty free classes, ascending.
    pub fn free_class_sizes(&self) -> Vec<usize> {
        self.free_lists
            .iter_nonempty()
            .map(|(class, _)| class)
            .collect()
    }

    /// Copies the current state.
    pub fn snapshot(&self) -> Snapshot {
        let free_classes = self
            .free_lists
            .iter_nonempty()
            .map(|(size, addrs)| {
                let mut addresses = addrs.to_vec();
                addresses.sort_unstable();
                FreeClassInfo { size, addresses }
            })
            .collect();
        Snapshot {
            total_size: self.total_size,
            allocated: self.allocated_blocks().collect(),
            free_classes,
        }
    }

    /// Aggregate occupancy and fragmentation.
    pub fn stats(&self) -> BuddyStats {
        BuddyStats::compute(
            self.total_size,
            self.table.allocated_bytes(),
            self.table.len(),
            self.free_lists.total_bytes(),
            self.free_lists.total_blocks(),
            self.free_lists.largest_available().unwrap_or(0),
        )
    }

    /// Returns the retained lifecycle records, oldest first.
    pub fn lifecycle_logs(&self) -> impl ExactSizeIterator<Item = &BuddyLogRecord> + '_ {
        self.lifecycle_logs.iter()
    }

    /// Drains allocator lifecycle log records.
    pub fn drain_lifecycle_logs(&mut self) -> Vec<BuddyLogRecord> {
        self.lifecycle_logs.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audited(total: usize) -> BuddyAllocator {
        BuddyAllocator::with_config(BuddyConfig::new(total).with_audit(AuditLevel::Full)).unwrap()
    }

    fn free_map(alloc: &BuddyAllocator) -> Vec<(usize, Vec<usize>)> {
        alloc
            .snapshot()
            .free_classes
            .into_iter()
            .map(|c| (c.size, c.addresses))
            .collect()
    }

    #[test]
    fn test_new_state() {
        let alloc = audited(1024);
        assert_eq!(alloc.total_size(), 1024);
        assert!(alloc.snapshot().is_pristine());
        assert_eq!(alloc.free_class_sizes(), vec![1024]);
        assert_eq!(alloc.verify_partition(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_pool_sizes() {
        for total in [0, 3, 1000, 1536] {
            assert_eq!(
                BuddyAllocator::new(total).unwrap_err(),
                BuddyError::InvalidPoolSize { total }
            );
        }
        assert!(BuddyAllocator::new(1).is_ok());
    }

    #[test]
    fn test_allocate_splits_down() {
        let mut alloc = audited(1024);
        assert_eq!(alloc.allocate(100), Ok(0));
        assert_eq!(
            free_map(&alloc),
            vec![(128, vec![128]), (256, vec![256]), (512, vec![512])]
        );
        assert_eq!(alloc.lookup(0), Some(128));
    }

    #[test]
    fn test_is_free_tracks_shed_buddies() {
        let mut alloc = audited(1024);
        assert!(alloc.is_free(1024, 0));
        alloc.allocate(100).unwrap();
        assert!(!alloc.is_free(1024, 0));
        assert!(alloc.is_free(128, 128));
        assert!(alloc.is_free(256, 256));
        assert!(alloc.is_free(512, 512));
        assert!(!alloc.is_free(128, 0));
        alloc.free(0, 100).unwrap();
        assert!(alloc.is_free(1024, 0));
        assert!(!alloc.is_free(128, 128));
    }

    #[test]
    fn test_requests_beyond_pool_are_exhaustion() {
        let mut alloc = audited(1024);
        alloc.allocate(100).unwrap();
        let before = alloc.snapshot();
        assert_eq!(
            alloc.allocate(usize::MAX),
            Err(BuddyError::AllocationFailed {
                requested: usize::MAX,
                class: 0
            })
        );
        assert!(alloc.allocate(usize::MAX).unwrap_err().is_exhaustion());
        assert_eq!(
            alloc.allocate((usize::MAX >> 1) + 2),
            Err(BuddyError::AllocationFailed {
                requested: (usize::MAX >> 1) + 2,
                class: 0
            })
        );
        assert_eq!(alloc.snapshot(), before);
        let last = alloc.lifecycle_logs().last().unwrap();
        assert_eq!(last.event, "alloc_failed");
        assert_eq!(last.size, Some((usize::MAX >> 1) + 2));
    }

    #[test]
    fn test_free_beyond_pool_is_mismatch() {
        let mut alloc = audited(1024);
        alloc.allocate(100).unwrap();
        let before = alloc.snapshot();
        assert!(matches!(
            alloc.free(0, usize::MAX),
            Err(BuddyError::MismatchedBlock { address: 0, .. })
        ));
        assert_eq!(
            alloc.free(0, 2000),
            Err(BuddyError::MismatchedBlock {
                address: 0,
                size: 2048
            })
        );
        assert_eq!(alloc.snapshot(), before);
    }

    #[test]
    fn test_allocate_exact_class_does_not_split() {
        let mut alloc = audited(1024);
        alloc.allocate(100).unwrap();
        let before = alloc.free_lists.total_blocks();
        assert_eq!(alloc.allocate(200), Ok(256));
        assert_eq!(alloc.free_lists.total_blocks(), before - 1);
        assert_eq!(free_map(&alloc), vec![(128, vec![128]), (512, vec![512])]);
    }

    #[test]
    fn test_allocate_prefers_smallest_class() {
        let mut alloc = audited(1024);
        // Leaves free {128:[128], 256:[256], 512:[512]}.
        alloc.allocate(128).unwrap();
        // 64 must come from the 128 block, not from 256 or 512.
        assert_eq!(alloc.allocate(64), Ok(128));
        assert_eq!(
            free_map(&alloc),
            vec![(64, vec![192]), (256, vec![256]), (512, vec![512])]
        );
    }

    #[test]
    fn test_allocate_invalid_and_oversized() {
        let mut alloc = audited(1024);
        assert_eq!(alloc.allocate(0), Err(BuddyError::InvalidSize { requested: 0 }));
        assert_eq!(
            alloc.allocate(1025),
            Err(BuddyError::AllocationFailed {
                requested: 1025,
                class: 2048
            })
        );
        assert!(alloc.snapshot().is_pristine());
    }

    #[test]
    fn test_exhaustion_leaves_state_unchanged() {
        let mut alloc = audited(1024);
        alloc.allocate(512).unwrap();
        alloc.allocate(256).unwrap();
        let before = alloc.snapshot();
        let err = alloc.allocate(512).unwrap_err();
        assert!(err.is_exhaustion());
        assert_eq!(alloc.snapshot(), before);
    }

    #[test]
    fn test_full_pool_round_trip() {
        let mut alloc = audited(1024);
        assert_eq!(alloc.allocate(1024), Ok(0));
        assert!(alloc.free_class_sizes().is_empty());
        assert_eq!(
            alloc.allocate(1),
            Err(BuddyError::AllocationFailed {
                requested: 1,
                class: 1
            })
        );
        alloc.free(0, 1024).unwrap();
        assert!(alloc.snapshot().is_pristine());
    }

    #[test]
    fn test_free_merges_until_allocated_buddy() {
        let mut alloc = audited(1024);
        alloc.allocate(100).unwrap();
        alloc.allocate(200).unwrap();
        alloc.free(0, 100).unwrap();
        assert_eq!(free_map(&alloc), vec![(256, vec![0]), (512, vec![512])]);
        let allocated: Vec<BlockInfo> = alloc.allocated_blocks().collect();
        assert_eq!(
            allocated,
            vec![BlockInfo {
                address: 256,
                size: 256
            }]
        );
    }

    #[test]
    fn test_free_mismatch_is_rejected() {
        let mut alloc = audited(1024);
        alloc.allocate(100).unwrap();
        let before = alloc.snapshot();
        assert_eq!(
            alloc.free(0, 300),
            Err(BuddyError::MismatchedBlock {
                address: 0,
                size: 512
            })
        );
        assert_eq!(
            alloc.free(128, 100),
            Err(BuddyError::MismatchedBlock {
                address: 128,
                size: 128
            })
        );
        assert_eq!(alloc.free(0, 0), Err(BuddyError::InvalidSize { requested: 0 }));
        assert_eq!(alloc.snapshot(), before);
    }

    #[test]
    fn test_double_free_is_mismatch() {
        let mut alloc = audited(1024);
        let addr = alloc.allocate(64).unwrap();
        alloc.free(addr, 64).unwrap();
        assert_eq!(
            alloc.free(addr, 64),
            Err(BuddyError::MismatchedBlock {
                address: addr,
                size: 64
            })
        );
        assert!(alloc.snapshot().is_pristine());
    }

    #[test]
    fn test_free_accepts_any_request_in_class() {
        let mut alloc = audited(1024);
        let addr = alloc.allocate(100).unwrap();
        alloc.free(addr, 65).unwrap();
        assert!(alloc.snapshot().is_pristine());
    }

    #[test]
    fn test_free_list_miss_is_internal_violation() {
        let mut alloc = audited(1024);
        let err = alloc.remove_free("free", 128, 384).unwrap_err();
        assert_eq!(
            err,
            BuddyError::InternalInvariantViolation {
                class: 128,
                address: 384
            }
        );
        assert!(err.is_internal());
        let last = alloc.lifecycle_logs().last().unwrap();
        assert_eq!(last.event, "invariant_free_list_miss");
        assert_eq!(last.level, BuddyLogLevel::Error);
    }

    #[test]
    fn test_audit_reports_broken_partition() {
        let mut alloc = audited(1024);
        alloc.allocate(512).unwrap();
        // A free block that overlaps the allocated one.
        alloc.free_lists.insert(256, 256);
        let err = alloc.allocate(256).unwrap_err();
        assert!(err.is_internal(), "{err:?}");
        assert!(
            alloc
                .lifecycle_logs()
                .any(|r| r.event == "invariant_partition_broken" && r.level == BuddyLogLevel::Error)
        );
    }

    #[test]
    fn test_lifecycle_records() {
        let mut alloc = audited(1024);
        alloc.allocate(100).unwrap();
        alloc.allocate(200).unwrap();
        alloc.free(0, 100).unwrap();
        let logs: Vec<&BuddyLogRecord> = alloc.lifecycle_logs().collect();
        assert_eq!(logs[0].event, "pool_init");
        let splits = logs.iter().filter(|r| r.event == "split").count();
        assert_eq!(splits, 3);
        let merges: Vec<_> = logs.iter().filter(|r| r.event == "merge").collect();
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].address, Some(0));
        assert_eq!(merges[0].size, Some(256));
        assert!(logs.iter().all(|r| r.trace_id.starts_with("core::buddy::")));
        let ids: Vec<u64> = logs.iter().map(|r| r.decision_id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let last = logs.last().unwrap();
        assert_eq!(last.allocated_bytes + last.free_bytes, 1024);
    }

    #[test]
    fn test_log_capacity_bounds_buffer() {
        let mut alloc = BuddyAllocator::with_config(
            BuddyConfig::new(1024)
                .with_audit(AuditLevel::Off)
                .with_log_capacity(4),
        )
        .unwrap();
        for _ in 0..8 {
            let a = alloc.allocate(1).unwrap();
            alloc.free(a, 1).unwrap();
        }
        assert_eq!(alloc.lifecycle_logs().len(), 4);
        let drained = alloc.drain_lifecycle_logs();
        assert_eq!(drained.len(), 4);
        assert_eq!(alloc.lifecycle_logs().len(), 0);
    }

    #[test]
    fn test_zero_log_capacity_disables_recording() {
        let mut alloc =
            BuddyAllocator::with_config(BuddyConfig::new(64).with_log_capacity(0)).unwrap();
        alloc.allocate(8).unwrap();
        assert_eq!(alloc.lifecycle_logs().len(), 0);
    }

    #[test]
    fn test_stats() {
        let mut alloc = audited(1024);
        alloc.allocate(100).unwrap();
        alloc.allocate(200).unwrap();
        alloc.free(0, 100).unwrap();
        let stats = alloc.stats();
        assert_eq!(stats.allocated_bytes, 256);
        assert_eq!(stats.free_bytes, 768);
        assert_eq!(stats.allocated_blocks, 1);
        assert_eq!(stats.free_blocks, 2);
        assert_eq!(stats.largest_free_block, 512);
        assert_eq!(stats.fragmentation_permille, 334);
    }

    #[test]
    fn test_unit_pool() {
        let mut alloc = audited(1);
        assert_eq!(alloc.allocate(1), Ok(0));
        assert!(alloc.allocate(1).unwrap_err().is_exhaustion());
        alloc.free(0, 1).unwrap();
        assert!(alloc.snapshot().is_pristine());
    }
}
