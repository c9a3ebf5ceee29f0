//! Integration test: a full interactive session driven from a byte buffer.

use buddysim_harness::shell::run_shell;

fn session(input: &str, pool_size: Option<usize>) -> String {
    let mut out = Vec::new();
    run_shell(input.as_bytes(), &mut out, pool_size).expect("session completes");
    String::from_utf8(out).expect("utf-8 output")
}

#[test]
fn scenario_session_transcript() {
    let input = "1024\n1\n100\n1\n200\n3\n2\n0\n100\n3\n4\n";
    let out = session(input, None);

    let expected_order = [
        "Enter the total memory pool size (in KB): ",
        "Allocated 128 KB at address 0.",
        "Allocated 256 KB at address 256.",
        "Address: 0, Size: 128 KB",
        "Merged blocks into 256 KB at address 0.",
        "Exiting...",
    ];
    let mut cursor = 0;
    for needle in expected_order {
        let found = out[cursor..]
            .find(needle)
            .unwrap_or_else(|| panic!("missing '{needle}' after offset {cursor}:\n{out}"));
        cursor += found + needle.len();
    }

    // Final print: 256@256 allocated, free classes 256 and 512.
    let last_state = out.rsplit("Memory State:").next().unwrap();
    assert!(last_state.contains("Address: 256, Size: 256 KB"));
    assert!(!last_state.contains("Address: 0, Size: 128 KB"));
    assert!(last_state.contains("Block Size: 256\n  Addresses: 0\n"));
    assert!(last_state.contains("Block Size: 512\n  Addresses: 512\n"));
}

#[test]
fn menu_survives_bad_input_until_exit() {
    let input = "x\n5\n2\nfoo\n3\n1\n-4\n4\n1\n8\n";
    let out = session(input, Some(64));
    assert_eq!(out.matches("Invalid choice. Please try again.").count(), 2);
    assert_eq!(out.matches("Invalid number. Please try again.").count(), 2);
    assert!(out.contains("Exiting..."));
    // Nothing after exit is processed.
    assert!(!out.contains("Allocated 8 KB"));
}

#[test]
fn exhaustion_then_recovery() {
    let input = "1\n64\n1\n1\n2\n0\n64\n1\n1\n";
    let out = session(input, Some(64));
    assert!(out.contains("Allocated 64 KB at address 0."));
    assert!(out.contains("Allocation failed: Not enough memory."));
    assert!(out.contains("Allocated 1 KB at address 0."));
}
