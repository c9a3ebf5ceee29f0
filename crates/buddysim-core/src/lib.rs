//! # buddysim-core
//!
//! A buddy memory allocator engine over a simulated address range `[0, T)`.
//!
//! The pool is split into power-of-two blocks on allocation and recursively
//! coalesced with free buddies on deallocation. Addresses are plain offsets;
//! no real memory is touched, so no `unsafe` code is permitted.

#![deny(unsafe_code)]

pub mod buddy;
pub mod config;
pub mod error;

pub use buddy::{
    BlockInfo, BuddyAllocator, BuddyLogLevel, BuddyLogRecord, BuddyStats, FreeClassInfo,
    InvariantViolation, SharedBuddyAllocator, Snapshot, classify,
};
pub use config::{AuditLevel, BuddyConfig};
pub use error::{BuddyError, BuddyResult, FreeListError};
