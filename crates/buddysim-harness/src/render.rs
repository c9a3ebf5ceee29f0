//! Human-readable memory state dump.

use std::fmt::Write;

use buddysim_core::Snapshot;

/// Renders allocated blocks in address order, then each non-empty free class
/// in ascending size with its addresses.
#[must_use]
pub fn render_state(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Memory State:");
    let _ = writeln!(out, "Allocated Blocks:");
    for block in &snapshot.allocated {
        let _ = writeln!(out, "Address: {}, Size: {} KB", block.address, block.size);
    }
    let _ = writeln!(out, "Free Blocks:");
    for class in &snapshot.free_classes {
        let _ = writeln!(out, "Block Size: {}", class.size);
        let addresses: Vec<String> = class.addresses.iter().map(usize::to_string).collect();
        let _ = writeln!(out, "  Addresses: {}", addresses.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use buddysim_core::{AuditLevel, BuddyAllocator, BuddyConfig};

    #[test]
    fn renders_scenario_state() {
        let mut alloc =
            BuddyAllocator::with_config(BuddyConfig::new(1024).with_audit(AuditLevel::Full))
                .unwrap();
        alloc.allocate(100).unwrap();
        alloc.allocate(200).unwrap();
        let text = render_state(&alloc.snapshot());
        assert_eq!(
            text,
            "Memory State:\n\
             Allocated Blocks:\n\
             Address: 0, Size: 128 KB\n\
             Address: 256, Size: 256 KB\n\
             Free Blocks:\n\
             Block Size: 128\n  Addresses: 128\n\
             Block Size: 512\n  Addresses: 512\n"
        );
    }

    #[test]
    fn renders_empty_sections() {
        let mut alloc = BuddyAllocator::new(64).unwrap();
        alloc.allocate(64).unwrap();
        let text = render_state(&alloc.snapshot());
        assert!(text.ends_with("Free Blocks:\n"));
        assert!(text.contains("Address: 0, Size: 64 KB"));
    }
}
