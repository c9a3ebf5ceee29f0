//! Driver tooling for buddysim.
//!
//! This crate provides:
//! - Interactive shell: the menu-driven allocate/free/print loop
//! - Script replay: run a line-based op script and report per-step outcomes
//! - Rendering: human-readable memory state dumps
//! - Structured logging: JSONL records, schema validation, artifact index

#![forbid(unsafe_code)]

pub mod render;
pub mod script;
pub mod shell;
pub mod structured_log;

pub use render::render_state;
pub use script::{Replay, ReplayReport, ScriptError, ScriptOp, ScriptStep, parse_script, replay};
pub use shell::{ShellError, run_shell};
pub use structured_log::{ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome};
