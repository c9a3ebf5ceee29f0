//! Buddy allocation over a single power-of-two pool.
//!
//! - `size_class`: request -> power-of-two class rounding and buddy arithmetic
//! - `free_list`: per-class free block sets, scanned in ascending order
//! - `allocation_table`: address -> size for allocated blocks
//! - `allocator`: split-on-allocate and merge-on-free engine
//! - `audit`: partition/conservation verification
//! - `shared`: single-lock wrapper for concurrent callers

pub mod allocation_table;
pub mod allocator;
pub mod audit;
pub mod free_list;
pub mod shared;
pub mod size_class;
pub mod snapshot;

pub use allocation_table::AllocationTable;
pub use allocator::{BuddyAllocator, BuddyLogLevel, BuddyLogRecord};
pub use audit::InvariantViolation;
pub use free_list::FreeLists;
pub use shared::SharedBuddyAllocator;
pub use size_class::classify;
pub use snapshot::{BlockInfo, BuddyStats, FreeClassInfo, Snapshot};
