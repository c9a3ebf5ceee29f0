//! Engine configuration.
//!
//! The audit level is set via the `BUDDYSIM_AUDIT` environment variable:
//! - `off` (default): no extra checking beyond the engine's own bookkeeping.
//! - `full`: the whole partition of `[0, T)` is re-verified after every
//!   successful `allocate`/`free`. A failed audit is reported as an internal
//!   invariant violation.

use std::sync::OnceLock;

/// Default number of lifecycle records retained by an allocator.
pub const DEFAULT_LOG_CAPACITY: usize = 4096;

/// How much self-checking the engine performs after each mutation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditLevel {
    /// No post-mutation audit.
    #[default]
    Off,
    /// Verify conservation, alignment and tiling after every mutation.
    Full,
}

impl AuditLevel {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "on" | "strict" | "paranoid" | "1" => Self::Full,
            _ => Self::Off,
        }
    }

    /// Returns true if the partition audit runs after mutations.
    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::Full)
    }
}

static GLOBAL_AUDIT: OnceLock<AuditLevel> = OnceLock::new();

/// Get the configured audit level (reads env var on first call, caches thereafter).
#[must_use]
pub fn audit_level() -> AuditLevel {
    *GLOBAL_AUDIT.get_or_init(|| {
        std::env::var("BUDDYSIM_AUDIT")
            .map(|v| AuditLevel::from_str_loose(&v))
            .unwrap_or_default()
    })
}

/// Construction parameters for a [`BuddyAllocator`](crate::BuddyAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyConfig {
    /// Pool size `T`; must be a power of two.
    pub total_size: usize,
    /// Post-mutation audit level.
    pub audit: AuditLevel,
    /// Maximum retained lifecycle records. Zero disables recording.
    pub log_capacity: usize,
}

impl BuddyConfig {
    /// Config for a pool of `total_size` bytes with the process-wide audit level.
    #[must_use]
    pub fn new(total_size: usize) -> Self {
        Self {
            total_size,
            audit: audit_level(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    /// Override the audit level.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditLevel) -> Self {
        self.audit = audit;
        self
    }

    /// Override the lifecycle log capacity.
    #[must_use]
    pub fn with_log_capacity(mut self, log_capacity: usize) -> Self {
        self.log_capacity = log_capacity;
        self
    }
}
